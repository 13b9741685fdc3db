//! Event fire persistence.
//!
//! A fire is pending while `fired` is NULL and terminal once it is set,
//! together with a result (`F` fired, `S` skipped). The partial unique index
//! `campaign_event_fires_unfired_unique` allows one pending fire per
//! (event, contact); [`FireStore::add_fires`] inserts with `OR IGNORE`, so
//! scheduling a pair that is already pending is a no-op.
//!
//! Every write only touches pending rows: deletes filter on `fired IS NULL`
//! and [`FireStore::mark_fired`] does too, which makes marking the same fire
//! twice harmless.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::{
    ids::{ContactId, EventId, FireId},
    models::{FireRow, NewFireRow},
    schema::campaign_event_fires::dsl as cef,
    tz,
};

/// Rows per multi-row INSERT (three bound values each).
const ROWS_PER_INSERT: usize = 300;
/// Values per `IN (...)` list.
const IDS_PER_QUERY: usize = 900;

/// Outcome recorded when a fire is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    /// The flow was started ("F").
    Fired,
    /// The contact was skipped ("S").
    Skipped,
}

impl FireResult {
    /// Storage code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Fired => "F",
            Self::Skipped => "S",
        }
    }

    /// Parse the storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Self::Fired),
            "S" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// A fire as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFire {
    /// Fire id.
    pub id: FireId,
    /// Campaign event.
    pub event_id: EventId,
    /// Contact.
    pub contact_id: ContactId,
    /// When it is due.
    pub scheduled: DateTime<Utc>,
    /// When it was handled.
    pub fired: Option<DateTime<Utc>>,
    /// How it was handled.
    pub result: Option<FireResult>,
}

impl EventFire {
    /// Still waiting to be handled.
    pub fn is_pending(&self) -> bool {
        self.fired.is_none()
    }
}

impl TryFrom<FireRow> for EventFire {
    type Error = anyhow::Error;

    fn try_from(row: FireRow) -> anyhow::Result<Self> {
        let result = row
            .fired_result
            .as_deref()
            .map(|code| {
                FireResult::from_code(code)
                    .with_context(|| format!("bad fired_result {code:?} on fire #{}", row.id))
            })
            .transpose()?;
        Ok(Self {
            id: FireId(row.id),
            event_id: EventId(row.event_id),
            contact_id: ContactId(row.contact_id),
            scheduled: tz::parse_ts_to_utc(&row.scheduled)?,
            fired: row.fired.as_deref().map(tz::parse_ts_to_utc).transpose()?,
            result,
        })
    }
}

/// A fire to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFire {
    /// Campaign event.
    pub event_id: EventId,
    /// Contact.
    pub contact_id: ContactId,
    /// When it is due.
    pub scheduled: DateTime<Utc>,
}

/// Storage for event fires. Calls run on the caller's connection and inside
/// whatever transaction the caller holds.
pub trait FireStore {
    /// Insert pending fires; pairs that already have one are skipped.
    /// Returns how many rows were inserted.
    fn add_fires(&self, conn: &mut SqliteConnection, fires: &[NewFire]) -> anyhow::Result<usize>;

    /// Delete pending fires for the given (event, contact) pairs.
    fn delete_unfired(
        &self,
        conn: &mut SqliteConnection,
        pairs: &[(EventId, ContactId)],
    ) -> anyhow::Result<usize>;

    /// Delete every pending fire of these contacts, whatever the event.
    fn delete_unfired_for_contacts(
        &self,
        conn: &mut SqliteConnection,
        contacts: &[ContactId],
    ) -> anyhow::Result<usize>;

    /// Delete every pending fire of an event.
    fn delete_unfired_for_event(
        &self,
        conn: &mut SqliteConnection,
        event_id: EventId,
    ) -> anyhow::Result<usize>;

    /// Mark pending fires as handled. Fires that are already terminal are
    /// left alone and not counted.
    fn mark_fired(
        &self,
        conn: &mut SqliteConnection,
        ids: &[FireId],
        fired: DateTime<Utc>,
        result: FireResult,
    ) -> anyhow::Result<usize>;

    /// Up to `limit` pending fires due at or before `now`, earliest first.
    fn load_due(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<EventFire>>;

    /// Fires by id, in id order.
    fn load_fires(
        &self,
        conn: &mut SqliteConnection,
        ids: &[FireId],
    ) -> anyhow::Result<Vec<EventFire>>;

    /// Pending fires of one event, by contact.
    fn load_unfired_for_event(
        &self,
        conn: &mut SqliteConnection,
        event_id: EventId,
    ) -> anyhow::Result<Vec<EventFire>>;
}

/// [`FireStore`] over the `campaign_event_fires` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFireStore;

impl SqliteFireStore {
    /// New store.
    pub fn new() -> Self {
        Self
    }
}

fn to_events(rows: Vec<FireRow>) -> anyhow::Result<Vec<EventFire>> {
    rows.into_iter().map(EventFire::try_from).collect()
}

impl FireStore for SqliteFireStore {
    fn add_fires(&self, conn: &mut SqliteConnection, fires: &[NewFire]) -> anyhow::Result<usize> {
        let rows: Vec<NewFireRow> = fires
            .iter()
            .map(|f| NewFireRow {
                event_id: f.event_id.0,
                contact_id: f.contact_id.0,
                scheduled: tz::to_rfc3339_millis(f.scheduled),
            })
            .collect();

        let mut inserted = 0;
        for chunk in rows.chunks(ROWS_PER_INSERT) {
            inserted += diesel::insert_or_ignore_into(cef::campaign_event_fires)
                .values(chunk)
                .execute(conn)
                .context("insert event fires")?;
        }
        Ok(inserted)
    }

    fn delete_unfired(
        &self,
        conn: &mut SqliteConnection,
        pairs: &[(EventId, ContactId)],
    ) -> anyhow::Result<usize> {
        let mut by_event: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for (event, contact) in pairs {
            by_event.entry(event.0).or_default().push(contact.0);
        }

        let mut deleted = 0;
        for (event, contacts) in by_event {
            for chunk in contacts.chunks(IDS_PER_QUERY) {
                deleted += diesel::delete(
                    cef::campaign_event_fires
                        .filter(cef::event_id.eq(event))
                        .filter(cef::contact_id.eq_any(chunk))
                        .filter(cef::fired.is_null()),
                )
                .execute(conn)
                .with_context(|| format!("delete unfired fires of event #{event}"))?;
            }
        }
        Ok(deleted)
    }

    fn delete_unfired_for_contacts(
        &self,
        conn: &mut SqliteConnection,
        contacts: &[ContactId],
    ) -> anyhow::Result<usize> {
        let ids: Vec<i32> = contacts.iter().map(|c| c.0).collect();
        let mut deleted = 0;
        for chunk in ids.chunks(IDS_PER_QUERY) {
            deleted += diesel::delete(
                cef::campaign_event_fires
                    .filter(cef::contact_id.eq_any(chunk))
                    .filter(cef::fired.is_null()),
            )
            .execute(conn)
            .context("delete unfired fires of contacts")?;
        }
        Ok(deleted)
    }

    fn delete_unfired_for_event(
        &self,
        conn: &mut SqliteConnection,
        event_id: EventId,
    ) -> anyhow::Result<usize> {
        let deleted = diesel::delete(
            cef::campaign_event_fires
                .filter(cef::event_id.eq(event_id.0))
                .filter(cef::fired.is_null()),
        )
        .execute(conn)
        .with_context(|| format!("delete unfired fires of event #{event_id}"))?;
        Ok(deleted)
    }

    fn mark_fired(
        &self,
        conn: &mut SqliteConnection,
        ids: &[FireId],
        fired: DateTime<Utc>,
        result: FireResult,
    ) -> anyhow::Result<usize> {
        let fired = tz::to_rfc3339_millis(fired);
        let ids: Vec<i32> = ids.iter().map(|f| f.0).collect();
        let mut updated = 0;
        for chunk in ids.chunks(IDS_PER_QUERY) {
            updated += diesel::update(
                cef::campaign_event_fires
                    .filter(cef::id.eq_any(chunk))
                    .filter(cef::fired.is_null()),
            )
            .set((
                cef::fired.eq(Some(fired.as_str())),
                cef::fired_result.eq(Some(result.code())),
            ))
            .execute(conn)
            .context("mark event fires")?;
        }
        Ok(updated)
    }

    fn load_due(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<EventFire>> {
        let rows = cef::campaign_event_fires
            .filter(cef::fired.is_null())
            .filter(cef::scheduled.le(tz::to_rfc3339_millis(now)))
            .order((cef::scheduled.asc(), cef::id.asc()))
            .limit(limit)
            .select(FireRow::as_select())
            .load(conn)
            .context("load due event fires")?;
        to_events(rows)
    }

    fn load_fires(
        &self,
        conn: &mut SqliteConnection,
        ids: &[FireId],
    ) -> anyhow::Result<Vec<EventFire>> {
        let ids: Vec<i32> = ids.iter().map(|f| f.0).collect();
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IDS_PER_QUERY) {
            rows.extend(
                cef::campaign_event_fires
                    .filter(cef::id.eq_any(chunk))
                    .select(FireRow::as_select())
                    .load(conn)
                    .context("load event fires")?,
            );
        }
        rows.sort_by_key(|r| r.id);
        to_events(rows)
    }

    fn load_unfired_for_event(
        &self,
        conn: &mut SqliteConnection,
        event_id: EventId,
    ) -> anyhow::Result<Vec<EventFire>> {
        let rows = cef::campaign_event_fires
            .filter(cef::event_id.eq(event_id.0))
            .filter(cef::fired.is_null())
            .order((cef::contact_id.asc(), cef::id.asc()))
            .select(FireRow::as_select())
            .load(conn)
            .with_context(|| format!("load unfired fires of event #{event_id}"))?;
        to_events(rows)
    }
}
