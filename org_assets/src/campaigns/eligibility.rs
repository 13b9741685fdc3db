//! Contact queries used by the scheduler.
//!
//! [`ContactRepo::eligible_members`] answers "who is in this group and what
//! is their reference time for this event" with one query: the member join
//! selects `created_on`, `last_seen_on`, or the `datetime_value` of one
//! field through a left join (NULL when the contact has no value).
//!
//! [`ContactRepo::load_contacts`] hydrates full [`Contact`]s (groups and
//! field values included) for reconciliation that starts from contact ids.

use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use diesel::prelude::*;
use uuid::Uuid;

use super::{
    contact::{Contact, FieldValue},
    event::RelativeTo,
};
use crate::{
    ids::{ContactId, GroupId, OrgId},
    models::{ContactRow, FieldValueRow},
    schema::{contact_field_values as cfv, contact_group_members as cgm, contacts as c},
    tz,
};

const IDS_PER_QUERY: usize = 900;

/// Read access to contacts.
pub trait ContactRepo {
    /// Active members of `group_id` with their reference time for
    /// `relative_to` (`None` when the contact has no value), ordered by id.
    fn eligible_members(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        group_id: GroupId,
        relative_to: &RelativeTo,
    ) -> anyhow::Result<Vec<(ContactId, Option<DateTime<Utc>>)>>;

    /// Active contacts by id, ordered by id. Unknown or inactive ids are
    /// dropped.
    fn load_contacts(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        ids: &[ContactId],
    ) -> anyhow::Result<Vec<Contact>>;
}

/// [`ContactRepo`] over the SQLite contact tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteContactRepo;

impl SqliteContactRepo {
    /// New repo.
    pub fn new() -> Self {
        Self
    }
}

fn parse_opt(raw: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(tz::parse_ts_to_utc).transpose()
}

impl ContactRepo for SqliteContactRepo {
    fn eligible_members(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        group_id: GroupId,
        relative_to: &RelativeTo,
    ) -> anyhow::Result<Vec<(ContactId, Option<DateTime<Utc>>)>> {
        let members = cgm::table.inner_join(c::table.on(c::id.eq(cgm::contact_id)));
        let in_group = cgm::group_id
            .eq(group_id.0)
            .and(c::org_id.eq(org_id.0))
            .and(c::is_active.eq(true));

        let rows: Vec<(i32, Option<String>)> = match relative_to {
            RelativeTo::CreatedOn => members
                .filter(in_group)
                .select((c::id, c::created_on.nullable()))
                .order(c::id.asc())
                .load(conn),
            RelativeTo::LastSeenOn => members
                .filter(in_group)
                .select((c::id, c::last_seen_on))
                .order(c::id.asc())
                .load(conn),
            RelativeTo::Field(key) => members
                .left_join(
                    cfv::table.on(cfv::contact_id
                        .eq(c::id)
                        .and(cfv::field_key.eq(key.as_str()))),
                )
                .filter(in_group)
                .select((c::id, cfv::datetime_value.nullable()))
                .order(c::id.asc())
                .load(conn),
        }
        .with_context(|| format!("load members of group #{group_id}"))?;

        rows.into_iter()
            .map(|(id, raw)| Ok((ContactId(id), parse_opt(raw)?)))
            .collect()
    }

    fn load_contacts(
        &self,
        conn: &mut SqliteConnection,
        org_id: OrgId,
        ids: &[ContactId],
    ) -> anyhow::Result<Vec<Contact>> {
        let ids: Vec<i32> = ids.iter().map(|id| id.0).collect();
        let mut contacts: Vec<Contact> = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(IDS_PER_QUERY) {
            let rows: Vec<ContactRow> = c::table
                .filter(c::id.eq_any(chunk))
                .filter(c::org_id.eq(org_id.0))
                .filter(c::is_active.eq(true))
                .select(ContactRow::as_select())
                .load(conn)
                .context("load contacts")?;

            let memberships: Vec<(i32, i32)> = cgm::table
                .filter(cgm::contact_id.eq_any(chunk))
                .select((cgm::contact_id, cgm::group_id))
                .load(conn)
                .context("load contact groups")?;

            let values: Vec<FieldValueRow> = cfv::table
                .filter(cfv::contact_id.eq_any(chunk))
                .select(FieldValueRow::as_select())
                .load(conn)
                .context("load contact field values")?;

            let mut by_id: HashMap<i32, Contact> = HashMap::with_capacity(rows.len());
            for row in rows {
                let uuid = Uuid::parse_str(&row.uuid)
                    .with_context(|| format!("bad contact uuid: {}", row.uuid))?;
                by_id.insert(
                    row.id,
                    Contact {
                        id: ContactId(row.id),
                        uuid,
                        created_on: tz::parse_ts_to_utc(&row.created_on)?,
                        last_seen_on: parse_opt(row.last_seen_on)?,
                        groups: Default::default(),
                        fields: HashMap::new(),
                    },
                );
            }
            for (contact_id, group_id) in memberships {
                if let Some(contact) = by_id.get_mut(&contact_id) {
                    contact.groups.insert(GroupId(group_id));
                }
            }
            for value in values {
                if let Some(contact) = by_id.get_mut(&value.contact_id) {
                    contact.fields.insert(
                        value.field_key,
                        FieldValue {
                            text: value.text_value,
                            datetime: parse_opt(value.datetime_value)?,
                        },
                    );
                }
            }
            contacts.extend(by_id.into_values());
        }

        contacts.sort_by_key(|c| c.id);
        Ok(contacts)
    }
}
