mod common;

use chrono::Duration;
use common::{seed_contact, setup_db, utc};
use diesel::prelude::*;
use org_assets::{
    campaigns::{FireResult, FireStore, NewFire, SqliteFireStore},
    ids::{ContactId, EventId, FireId},
    schema::campaign_event_fires::dsl as cef,
};

fn fire(event: i32, contact: ContactId, h: u32) -> NewFire {
    NewFire {
        event_id: EventId(event),
        contact_id: contact,
        scheduled: utc(2024, 2, 1, h, 0),
    }
}

fn count_rows(conn: &mut SqliteConnection) -> i64 {
    cef::campaign_event_fires.count().get_result(conn).unwrap()
}

#[test]
fn pending_fire_is_unique_per_pair() {
    let (_db, mut conn) = setup_db();
    let store = SqliteFireStore::new();
    let c1 = seed_contact(&mut conn, 1, utc(2024, 1, 1, 0, 0), None);
    let c2 = seed_contact(&mut conn, 2, utc(2024, 1, 1, 0, 0), None);

    let inserted = store
        .add_fires(&mut conn, &[fire(10, c1, 9), fire(10, c2, 9), fire(11, c1, 9)])
        .unwrap();
    assert_eq!(inserted, 3);

    // same pairs again, different times: ignored
    let inserted = store
        .add_fires(&mut conn, &[fire(10, c1, 12), fire(10, c2, 12)])
        .unwrap();
    assert_eq!(inserted, 0);
    assert_eq!(count_rows(&mut conn), 3);

    // once the pending fire is handled a new one may be scheduled
    let pending = store.load_unfired_for_event(&mut conn, EventId(10)).unwrap();
    assert_eq!(pending.len(), 2);
    store
        .mark_fired(&mut conn, &[pending[0].id], utc(2024, 2, 1, 9, 0), FireResult::Fired)
        .unwrap();
    assert_eq!(store.add_fires(&mut conn, &[fire(10, c1, 12)]).unwrap(), 1);
    assert_eq!(count_rows(&mut conn), 4);
}

#[test]
fn marking_twice_is_harmless() {
    let (_db, mut conn) = setup_db();
    let store = SqliteFireStore::new();
    let c1 = seed_contact(&mut conn, 1, utc(2024, 1, 1, 0, 0), None);
    store.add_fires(&mut conn, &[fire(10, c1, 9)]).unwrap();
    let id = store.load_unfired_for_event(&mut conn, EventId(10)).unwrap()[0].id;

    let first = utc(2024, 2, 1, 9, 0);
    assert_eq!(
        store.mark_fired(&mut conn, &[id], first, FireResult::Fired).unwrap(),
        1
    );
    assert_eq!(
        store
            .mark_fired(&mut conn, &[id], first + Duration::minutes(5), FireResult::Skipped)
            .unwrap(),
        0
    );

    let fires = store.load_fires(&mut conn, &[id]).unwrap();
    assert_eq!(fires.len(), 1);
    assert_eq!(fires[0].fired, Some(first));
    assert_eq!(fires[0].result, Some(FireResult::Fired));
    assert_eq!(count_rows(&mut conn), 1);
}

#[test]
fn due_fires_come_earliest_first() {
    let (_db, mut conn) = setup_db();
    let store = SqliteFireStore::new();
    let c1 = seed_contact(&mut conn, 1, utc(2024, 1, 1, 0, 0), None);
    let c2 = seed_contact(&mut conn, 2, utc(2024, 1, 1, 0, 0), None);
    store
        .add_fires(
            &mut conn,
            &[fire(10, c1, 11), fire(11, c1, 8), fire(10, c2, 9), fire(12, c2, 15)],
        )
        .unwrap();

    let due = store.load_due(&mut conn, utc(2024, 2, 1, 12, 0), 10).unwrap();
    let hours: Vec<_> = due.iter().map(|f| f.scheduled).collect();
    assert_eq!(
        hours,
        vec![utc(2024, 2, 1, 8, 0), utc(2024, 2, 1, 9, 0), utc(2024, 2, 1, 11, 0)]
    );
    assert!(due.iter().all(|f| f.is_pending()));

    let limited = store.load_due(&mut conn, utc(2024, 2, 1, 12, 0), 1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].event_id, EventId(11));

    store
        .mark_fired(&mut conn, &[limited[0].id], utc(2024, 2, 1, 12, 0), FireResult::Skipped)
        .unwrap();
    assert_eq!(store.load_due(&mut conn, utc(2024, 2, 1, 12, 0), 10).unwrap().len(), 2);
}

#[test]
fn deletes_only_touch_pending_fires() {
    let (_db, mut conn) = setup_db();
    let store = SqliteFireStore::new();
    let c1 = seed_contact(&mut conn, 1, utc(2024, 1, 1, 0, 0), None);
    let c2 = seed_contact(&mut conn, 2, utc(2024, 1, 1, 0, 0), None);
    store
        .add_fires(&mut conn, &[fire(10, c1, 9), fire(10, c2, 9), fire(11, c1, 9)])
        .unwrap();
    let handled: Vec<FireId> = store
        .load_unfired_for_event(&mut conn, EventId(11))
        .unwrap()
        .iter()
        .map(|f| f.id)
        .collect();
    store
        .mark_fired(&mut conn, &handled, utc(2024, 2, 1, 9, 0), FireResult::Fired)
        .unwrap();

    assert_eq!(store.delete_unfired_for_contacts(&mut conn, &[c1]).unwrap(), 1);
    let pairs = [(EventId(10), c1), (EventId(10), c2)];
    assert_eq!(store.delete_unfired(&mut conn, &pairs).unwrap(), 1);
    assert_eq!(store.delete_unfired_for_event(&mut conn, EventId(11)).unwrap(), 0);

    // the handled fire survives as history
    assert_eq!(count_rows(&mut conn), 1);
    assert_eq!(store.load_fires(&mut conn, &handled).unwrap()[0].result, Some(FireResult::Fired));
}
