//! Keeps event fires in line with group membership, field values and event
//! definitions.
//!
//! Every reconciliation deletes the pending fires it may have invalidated and
//! then recomputes from current data (delete-then-recompute), because a
//! change can both grant and revoke eligibility. Contact sets are processed
//! in chunks of `batch_size`, each chunk in its own transaction: `BEGIN
//! IMMEDIATE` on a bare connection, a savepoint when the caller already holds
//! a transaction (so a membership change and its fires commit together).
//! Without an outer transaction a failure leaves earlier chunks committed;
//! every step is idempotent, so the remedy is to repeat the whole call.

use std::{ops::AddAssign, sync::Arc};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::{
    Connection, SqliteConnection,
    connection::{AnsiTransactionManager, TransactionManager},
};
use tracing::{debug, info};

use super::{
    CampaignError,
    eligibility::{ContactRepo, SqliteContactRepo},
    event::CampaignEvent,
    fires::{FireStore, NewFire, SqliteFireStore},
};
use crate::{
    assets::Refresh,
    cache::AssetCache,
    config::AssetsConfig,
    ids::{ContactId, EventId, GroupId, OrgId},
};

/// Row counts touched by a reconciliation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Pending fires deleted.
    pub deleted: usize,
    /// Pending fires inserted.
    pub scheduled: usize,
}

impl AddAssign for ReconcileStats {
    fn add_assign(&mut self, rhs: Self) {
        self.deleted += rhs.deleted;
        self.scheduled += rhs.scheduled;
    }
}

/// Campaign event scheduler.
pub struct CampaignScheduler<F = SqliteFireStore, C = SqliteContactRepo> {
    cache: Arc<AssetCache>,
    fires: F,
    contacts: C,
    batch_size: usize,
}

impl CampaignScheduler {
    /// Scheduler over the SQLite stores, chunking by `config.fire_batch_size`.
    pub fn new(cache: Arc<AssetCache>, config: &AssetsConfig) -> Self {
        Self::with_stores(
            cache,
            SqliteFireStore::new(),
            SqliteContactRepo::new(),
            config.fire_batch_size,
        )
    }
}

impl<F: FireStore, C: ContactRepo> CampaignScheduler<F, C> {
    /// Scheduler over custom stores.
    pub fn with_stores(cache: Arc<AssetCache>, fires: F, contacts: C, batch_size: usize) -> Self {
        Self {
            cache,
            fires,
            contacts,
            batch_size: batch_size.max(1),
        }
    }

    /// Fire store in use.
    pub fn fires(&self) -> &F {
        &self.fires
    }

    /// Contacts were added to `group_id`: reschedule every event of the
    /// campaigns on that group for them.
    pub fn schedule_for_group_addition(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        group_id: GroupId,
        contacts: &[ContactId],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileStats> {
        let assets = self.cache.get(org_id)?;
        let view = assets.view();
        let events: Vec<Arc<CampaignEvent>> = view
            .campaigns_for_group(group_id)
            .iter()
            .flat_map(|c| c.events().iter().cloned())
            .collect();

        let stats = self.recompute(conn, org_id, view.timezone(), &events, contacts, now)?;
        info!(
            org_id = org_id.0,
            group_id = group_id.0,
            contacts = contacts.len(),
            events = events.len(),
            deleted = stats.deleted,
            scheduled = stats.scheduled,
            "rescheduled campaign events for group addition"
        );
        Ok(stats)
    }

    /// Contacts left `group_id`: drop their pending fires for that group's
    /// campaigns. Nothing is recomputed.
    pub fn remove_for_group_removal(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        group_id: GroupId,
        contacts: &[ContactId],
    ) -> anyhow::Result<ReconcileStats> {
        let assets = self.cache.get(org_id)?;
        let event_ids: Vec<EventId> = assets
            .view()
            .campaigns_for_group(group_id)
            .iter()
            .flat_map(|c| c.events().iter().map(|e| e.id))
            .collect();

        let mut stats = ReconcileStats::default();
        if event_ids.is_empty() {
            return Ok(stats);
        }
        for chunk in contacts.chunks(self.batch_size) {
            let pairs: Vec<(EventId, ContactId)> = event_ids
                .iter()
                .flat_map(|e| chunk.iter().map(move |c| (*e, *c)))
                .collect();
            let deleted = chunk_transaction(conn, |conn| {
                self.fires.delete_unfired(conn, &pairs)
            })?;
            debug!(org_id = org_id.0, chunk = chunk.len(), deleted, "group removal chunk");
            stats.deleted += deleted;
        }
        info!(
            org_id = org_id.0,
            group_id = group_id.0,
            contacts = contacts.len(),
            deleted = stats.deleted,
            "removed campaign event fires for group removal"
        );
        Ok(stats)
    }

    /// `field_key` changed for these contacts: reschedule every event
    /// relative to it.
    pub fn reschedule_for_field_change(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        field_key: &str,
        contacts: &[ContactId],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileStats> {
        let assets = self.cache.get(org_id)?;
        let view = assets.view();
        let events = view.events_relative_to(field_key).to_vec();

        let stats = self.recompute(conn, org_id, view.timezone(), &events, contacts, now)?;
        info!(
            org_id = org_id.0,
            field_key,
            contacts = contacts.len(),
            events = events.len(),
            deleted = stats.deleted,
            scheduled = stats.scheduled,
            "rescheduled campaign events for field change"
        );
        Ok(stats)
    }

    /// Schedule a new or edited event for every current member of its
    /// campaign's group.
    ///
    /// Campaigns are reloaded first so the edit is visible. Members and their
    /// reference times come from one query; existing pending fires of the
    /// event are replaced in the same transaction.
    pub fn schedule_campaign_event(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileStats> {
        let assets = self.cache.get_with_refresh(org_id, Refresh::CAMPAIGNS)?;
        let view = assets.view();
        let event = view
            .campaign_event(event_id)
            .cloned()
            .ok_or(CampaignError::EventNotFound(event_id))?;
        let campaign = event
            .campaign()
            .ok_or(CampaignError::EventNotFound(event_id))?;
        let tz = view.timezone();

        let stats = chunk_transaction(conn, |conn| {
            let members =
                self.contacts
                    .eligible_members(conn, org_id, campaign.group_id, &event.relative_to)?;
            let deleted = self.fires.delete_unfired_for_event(conn, event_id)?;

            let mut fires = Vec::with_capacity(members.len());
            for (contact_id, start) in members {
                let Some(start) = start else { continue };
                if let Some(scheduled) = event.schedule_for_time(tz, now, start)? {
                    fires.push(NewFire {
                        event_id,
                        contact_id,
                        scheduled,
                    });
                }
            }
            let scheduled = self.fires.add_fires(conn, &fires)?;
            Ok(ReconcileStats { deleted, scheduled })
        })?;

        info!(
            org_id = org_id.0,
            event_id = event_id.0,
            deleted = stats.deleted,
            scheduled = stats.scheduled,
            "scheduled campaign event"
        );
        Ok(stats)
    }

    /// The event was deactivated or deleted: drop all its pending fires.
    pub fn deactivate_event(
        &self,
        conn: &mut SqliteConnection,
        event_id: EventId,
    ) -> anyhow::Result<ReconcileStats> {
        let deleted = self.fires.delete_unfired_for_event(conn, event_id)?;
        info!(event_id = event_id.0, deleted, "unscheduled deactivated campaign event");
        Ok(ReconcileStats {
            deleted,
            scheduled: 0,
        })
    }

    /// Contacts were blocked, stopped or deleted: drop all their pending fires.
    pub fn remove_contacts(
        &self,
        conn: &mut SqliteConnection,
        contacts: &[ContactId],
    ) -> anyhow::Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        for chunk in contacts.chunks(self.batch_size) {
            stats.deleted += chunk_transaction(conn, |conn| {
                self.fires.delete_unfired_for_contacts(conn, chunk)
            })?;
        }
        info!(contacts = contacts.len(), deleted = stats.deleted, "unscheduled removed contacts");
        Ok(stats)
    }

    fn recompute(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        tz: Tz,
        events: &[Arc<CampaignEvent>],
        contacts: &[ContactId],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        if events.is_empty() {
            return Ok(stats);
        }

        for chunk in contacts.chunks(self.batch_size) {
            let chunk_stats = chunk_transaction(conn, |conn| {
                let pairs: Vec<(EventId, ContactId)> = events
                    .iter()
                    .flat_map(|e| chunk.iter().map(move |c| (e.id, *c)))
                    .collect();
                let deleted = self.fires.delete_unfired(conn, &pairs)?;

                let mut fires = Vec::new();
                for contact in self.contacts.load_contacts(conn, org_id, chunk)? {
                    for event in events {
                        if let Some(scheduled) = event.schedule_for_contact(tz, now, &contact)? {
                            fires.push(NewFire {
                                event_id: event.id,
                                contact_id: contact.id,
                                scheduled,
                            });
                        }
                    }
                }
                let scheduled = self.fires.add_fires(conn, &fires)?;
                Ok(ReconcileStats { deleted, scheduled })
            })?;

            debug!(
                org_id = org_id.0,
                chunk = chunk.len(),
                deleted = chunk_stats.deleted,
                scheduled = chunk_stats.scheduled,
                "reconciled chunk"
            );
            stats += chunk_stats;
        }
        Ok(stats)
    }
}

/// Run `f` in a savepoint when `conn` is inside a transaction, otherwise in
/// a new `IMMEDIATE` transaction.
fn chunk_transaction<T>(
    conn: &mut SqliteConnection,
    f: impl FnOnce(&mut SqliteConnection) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let depth = AnsiTransactionManager::transaction_manager_status_mut(conn)
        .transaction_depth()?;
    if depth.is_some() {
        conn.transaction(f)
    } else {
        conn.immediate_transaction(f)
    }
}
