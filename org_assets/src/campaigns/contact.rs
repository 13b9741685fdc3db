//! What the scheduler needs to know about a contact.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::event::RelativeTo;
use crate::ids::{ContactId, GroupId};

/// A contact field value. Date fields also carry the parsed instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    /// Raw text.
    pub text: String,
    /// Parsed datetime, when the value is one.
    pub datetime: Option<DateTime<Utc>>,
}

/// A contact as seen by campaign scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Contact id.
    pub id: ContactId,
    /// Contact UUID.
    pub uuid: Uuid,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Last inbound activity, if any.
    pub last_seen_on: Option<DateTime<Utc>>,
    /// Current group memberships.
    pub groups: BTreeSet<GroupId>,
    /// Field values by field key.
    pub fields: HashMap<String, FieldValue>,
}

impl Contact {
    /// Whether the contact is currently in `group_id`.
    pub fn in_group(&self, group_id: GroupId) -> bool {
        self.groups.contains(&group_id)
    }

    /// The instant an event relative to `relative_to` counts from.
    ///
    /// `created_on` always has one; `last_seen_on` and user fields only when
    /// set (and, for fields, holding a datetime).
    pub fn reference_time(&self, relative_to: &RelativeTo) -> Option<DateTime<Utc>> {
        match relative_to {
            RelativeTo::CreatedOn => Some(self.created_on),
            RelativeTo::LastSeenOn => self.last_seen_on,
            RelativeTo::Field(key) => self.fields.get(key).and_then(|v| v.datetime),
        }
    }
}
