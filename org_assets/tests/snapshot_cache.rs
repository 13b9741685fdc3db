mod common;

use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration as StdDuration,
};

use chrono::Duration;
use common::{static_cache, utc};
use org_assets::{
    assets::{
        Refresh, StaticAssets,
        loader::OrgData,
        types::{Channel, Group},
        Category, Flow, FlowType,
    },
    clock::ManualClock,
    ids::{ChannelId, FlowId, GroupId, OrgId},
};
use serde_json::json;
use uuid::Uuid;

const ORG: OrgId = OrgId(1);

fn channel(id: i32, name: &str) -> Channel {
    Channel {
        id: ChannelId(id),
        uuid: Uuid::new_v4(),
        name: name.into(),
        address: format!("+25078800000{id}"),
        schemes: vec!["tel".into()],
        country: Some("RW".into()),
        is_test: false,
    }
}

fn group(id: i32, name: &str) -> Group {
    Group {
        id: GroupId(id),
        uuid: Uuid::new_v4(),
        name: name.into(),
        query: None,
    }
}

fn fixture() -> (Arc<StaticAssets>, Arc<ManualClock>) {
    let store = Arc::new(StaticAssets::new());
    store.insert_org(
        ORG,
        OrgData {
            channels: vec![channel(1, "Android")],
            groups: vec![group(1, "Farmers"), group(2, "Teachers")],
            flows: vec![Flow {
                id: FlowId(9),
                uuid: Uuid::new_v4(),
                name: "Registration".into(),
                flow_type: FlowType::Messaging,
                definition: json!({"nodes": []}),
            }],
            ..OrgData::default()
        },
    );
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 1, 12, 0)));
    (store, clock)
}

#[test]
fn gets_within_ttl_share_one_snapshot() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);

    let a = cache.get(ORG).unwrap();
    clock.advance(Duration::seconds(2));
    let b = cache.get(ORG).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(store.load_count(Category::Channels), 1);
    assert_eq!(store.load_count(Category::Users), 1);
}

#[test]
fn expired_entry_is_rebuilt() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);

    let a = cache.get(ORG).unwrap();
    clock.advance(Duration::seconds(6));
    let b = cache.get(ORG).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(b.built_at(), utc(2024, 6, 1, 12, 0) + Duration::seconds(6));
    assert_eq!(store.load_count(Category::Groups), 2);
}

#[test]
fn concurrent_misses_build_once() {
    const CALLERS: usize = 8;
    let (store, clock) = fixture();
    store.set_delay(StdDuration::from_millis(150));
    let cache = static_cache(&store, &clock);
    let barrier = Barrier::new(CALLERS);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get(ORG)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(store.load_count(Category::Environment), 1);
    let first = results[0].as_ref().unwrap();
    for r in &results {
        assert!(Arc::ptr_eq(first, r.as_ref().unwrap()));
    }
}

#[test]
fn concurrent_misses_share_one_error() {
    const CALLERS: usize = 8;
    let (store, clock) = fixture();
    store.set_delay(StdDuration::from_millis(150));
    store.fail(Category::Templates, "store unavailable");
    let cache = static_cache(&store, &clock);
    let barrier = Barrier::new(CALLERS);

    let errors: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get(ORG).unwrap_err().to_string()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(store.load_count(Category::Templates), 1);
    assert!(errors.iter().all(|e| e == &errors[0]));
    assert!(errors[0].contains("templates"), "{}", errors[0]);

    // the failure is not cached
    store.clear_failure(Category::Templates);
    store.set_delay(StdDuration::ZERO);
    assert!(cache.get(ORG).is_ok());
}

#[test]
fn channel_refresh_reloads_channels_only() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);
    let before = cache.get(ORG).unwrap();

    store.update(ORG, |d| d.channels.push(channel(2, "Vonage")));
    let after = cache.get_with_refresh(ORG, Refresh::CHANNELS).unwrap();

    assert_eq!(before.channels().len(), 1);
    assert_eq!(after.channels().len(), 2);
    assert!(Arc::ptr_eq(before.groups(), after.groups()));
    assert!(Arc::ptr_eq(before.campaigns(), after.campaigns()));
    assert!(Arc::ptr_eq(before.flow_cache(), after.flow_cache()));
    assert_eq!(after.built_at(), before.built_at());

    // later plain gets see the refreshed snapshot
    assert!(Arc::ptr_eq(&after, &cache.get(ORG).unwrap()));
    assert_eq!(store.load_count(Category::Groups), 1);
    assert_eq!(store.load_count(Category::Channels), 2);
}

#[test]
fn flow_refresh_drops_the_flow_cache() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);
    let before = cache.get(ORG).unwrap();
    before.flow_by_id(FlowId(9)).unwrap();
    before.flow_by_id(FlowId(9)).unwrap();
    assert_eq!(store.load_count(Category::Flows), 1);

    let after = cache.get_with_refresh(ORG, Refresh::FLOWS).unwrap();
    assert!(!Arc::ptr_eq(before.flow_cache(), after.flow_cache()));
    after.flow_by_id(FlowId(9)).unwrap();
    assert_eq!(store.load_count(Category::Flows), 2);
    assert!(Arc::ptr_eq(before.channels(), after.channels()));
}

#[test]
fn missing_flow_is_not_found() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);
    let err = cache.get(ORG).unwrap().flow_by_id(FlowId(404)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn flush_and_unknown_org() {
    let (store, clock) = fixture();
    let cache = static_cache(&store, &clock);
    let a = cache.get(ORG).unwrap();
    cache.flush();
    let b = cache.get(ORG).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    let err = cache.get(OrgId(77)).unwrap_err();
    assert!(err.to_string().contains("77"), "{err}");
}
