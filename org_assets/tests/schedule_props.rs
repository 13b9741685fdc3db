mod common;

use chrono::{DateTime, Duration, LocalResult, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use common::event;
use org_assets::{
    campaigns::{Campaign, OffsetUnit, RelativeTo},
    ids::{CampaignId, GroupId},
    schedule::Schedule,
};
use proptest::prelude::*;
use uuid::Uuid;

const ZONES: [&str; 5] = [
    "UTC",
    "America/New_York",
    "Europe/London",
    "Australia/Sydney",
    "Asia/Kolkata",
];

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    // 2020-01-01 .. 2030-01-01, with and without sub-minute parts
    (1_577_836_800i64..1_893_456_000, prop_oneof![Just(0u32), 0u32..1_000_000_000])
        .prop_map(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).unwrap())
}

fn unit() -> impl Strategy<Value = OffsetUnit> {
    prop_oneof![
        Just(OffsetUnit::Minutes),
        Just(OffsetUnit::Hours),
        Just(OffsetUnit::Days),
        Just(OffsetUnit::Weeks),
    ]
}

fn schedule(
    tz: Tz,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    offset: i32,
    unit: OffsetUnit,
    delivery_hour: Option<u32>,
) -> Option<DateTime<Utc>> {
    let campaign = Campaign::new(
        CampaignId(1),
        Uuid::new_v4(),
        "Props",
        GroupId(1),
        vec![event(1, offset, unit, delivery_hour, RelativeTo::CreatedOn)],
    );
    campaign.events()[0]
        .schedule_for_time(tz, now, start)
        .expect("valid event")
}

proptest! {
    #[test]
    fn fires_are_after_now_on_whole_minutes(
        zone in 0..ZONES.len(),
        start in instant(),
        lag_minutes in -60i64 * 24 * 30..60 * 24 * 30,
        offset in -60i32..60,
        unit in unit(),
        delivery_hour in proptest::option::of(0u32..24),
    ) {
        let tz: Tz = ZONES[zone].parse().unwrap();
        let now = start + Duration::minutes(lag_minutes);
        if let Some(fire) = schedule(tz, now, start, offset, unit, delivery_hour) {
            prop_assert!(fire > now);
            prop_assert_eq!(fire.second(), 0);
            prop_assert_eq!(fire.nanosecond(), 0);
            if let Some(hour) = delivery_hour {
                // a delivery hour inside a DST gap is pushed past it
                let local = fire.with_timezone(&tz);
                prop_assert!(local.hour() == hour || local.hour() == (hour + 1) % 24);
            }
        }
    }

    #[test]
    fn day_offsets_keep_wall_clock_time(
        zone in 0..ZONES.len(),
        start in instant(),
        days in 1i32..400,
        weeks in any::<bool>(),
    ) {
        let tz: Tz = ZONES[zone].parse().unwrap();
        let (offset, unit, span) = if weeks {
            (days / 7 + 1, OffsetUnit::Weeks, i64::from(days / 7 + 1) * 7)
        } else {
            (days, OffsetUnit::Days, i64::from(days))
        };
        let now = start - Duration::days(1);
        let fire = schedule(tz, now, start, offset, unit, None).expect("future fire");

        let mut local = start.with_timezone(&tz).naive_local();
        if local.second() != 0 || local.nanosecond() != 0 {
            let whole = local.with_second(0).unwrap().with_nanosecond(0).unwrap();
            local = whole + Duration::minutes(1);
        }
        let wanted = local + Duration::days(span);
        if !matches!(tz.from_local_datetime(&wanted), LocalResult::None) {
            prop_assert_eq!(fire.with_timezone(&tz).naive_local(), wanted);
        }
    }

    #[test]
    fn repeating_schedules_fire_after_now(
        zone in 0..ZONES.len(),
        now in instant(),
        hour in 0u32..24,
        minute in 0u32..60,
        day in 1u32..32,
    ) {
        let tz: Tz = ZONES[zone].parse().unwrap();
        for s in [
            Schedule::daily(hour, minute),
            Schedule::weekly("MRU", hour, minute),
            Schedule::monthly(day, hour, minute),
        ] {
            let fire = s.next_fire(tz, now).unwrap().expect("repeating schedule fires");
            prop_assert!(fire > now);
            prop_assert!(fire - now <= Duration::days(63));
        }
    }
}
