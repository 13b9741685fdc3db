#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use org_assets::{
    assets::{AssetLoader, AssetSources, FlowLoader, StaticAssets},
    cache::AssetCache,
    campaigns::{EventSpec, OffsetUnit, RelativeTo, StartMode},
    clock::{Clock, ManualClock},
    db::{connection, migrate},
    ids::{ContactId, EventId, FlowId},
    models::{NewContact, NewFieldValue, NewGroupMember},
    schema,
    tz::to_rfc3339_millis,
};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Insert an active contact of org 1.
pub fn seed_contact(
    conn: &mut SqliteConnection,
    id: i32,
    created_on: DateTime<Utc>,
    last_seen_on: Option<DateTime<Utc>>,
) -> ContactId {
    let uuid = Uuid::new_v4().to_string();
    let created_on = to_rfc3339_millis(created_on);
    let last_seen_on = last_seen_on.map(to_rfc3339_millis);
    diesel::insert_into(schema::contacts::table)
        .values(NewContact {
            id,
            org_id: 1,
            uuid: &uuid,
            created_on: &created_on,
            last_seen_on: last_seen_on.as_deref(),
            is_active: true,
        })
        .execute(conn)
        .unwrap();
    ContactId(id)
}

pub fn add_member(conn: &mut SqliteConnection, group_id: i32, contact: ContactId) {
    diesel::insert_into(schema::contact_group_members::table)
        .values(NewGroupMember {
            group_id,
            contact_id: contact.0,
        })
        .execute(conn)
        .unwrap();
}

pub fn remove_member(conn: &mut SqliteConnection, group_id: i32, contact: ContactId) {
    use schema::contact_group_members::dsl as cgm;
    diesel::delete(
        cgm::contact_group_members
            .filter(cgm::group_id.eq(group_id))
            .filter(cgm::contact_id.eq(contact.0)),
    )
    .execute(conn)
    .unwrap();
}

/// Upsert a date field value.
pub fn set_date_field(
    conn: &mut SqliteConnection,
    contact: ContactId,
    key: &str,
    value: Option<DateTime<Utc>>,
) {
    let text = value.map(to_rfc3339_millis).unwrap_or_default();
    let datetime = value.map(to_rfc3339_millis);
    let row = NewFieldValue {
        contact_id: contact.0,
        field_key: key,
        text_value: &text,
        datetime_value: datetime.as_deref(),
    };
    diesel::replace_into(schema::contact_field_values::table)
        .values(&row)
        .execute(conn)
        .unwrap();
}

pub fn event(
    id: i32,
    offset: i32,
    unit: OffsetUnit,
    delivery_hour: Option<u32>,
    relative_to: RelativeTo,
) -> EventSpec {
    EventSpec {
        id: EventId(id),
        uuid: Uuid::new_v4(),
        offset,
        unit,
        delivery_hour,
        relative_to,
        start_mode: StartMode::Interrupt,
        flow_id: FlowId(1),
    }
}

/// Cache over an in-memory store with a manual clock and a 5 s TTL.
pub fn static_cache(store: &Arc<StaticAssets>, clock: &Arc<ManualClock>) -> Arc<AssetCache> {
    let sources = AssetSources {
        assets: Arc::clone(store) as Arc<dyn AssetLoader>,
        flows: Arc::clone(store) as Arc<dyn FlowLoader>,
        flow_timeout: StdDuration::from_secs(30),
    };
    Arc::new(AssetCache::new(
        sources,
        Arc::clone(clock) as Arc<dyn Clock>,
        Duration::seconds(5),
    ))
}
