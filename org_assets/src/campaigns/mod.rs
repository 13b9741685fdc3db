//! Campaign event scheduling.
//!
//! - [`event`]: campaigns, their events and the fire-time arithmetic.
//! - [`contact`]: the contact shape the eligibility gates read.
//! - [`fires`]: persistence of scheduled and fired event fires.
//! - [`eligibility`]: contact queries (group members with their reference
//!   timestamp, contact hydration).
//! - [`scheduler`]: reconciliation of fires when membership, fields or
//!   events change.
//!
//! "No fire" (ineligible contact, start time already past) is `Ok(None)`;
//! errors are reserved for broken event definitions and store failures.

pub mod contact;
pub mod eligibility;
pub mod event;
pub mod fires;
pub mod scheduler;

use chrono::NaiveDateTime;

use crate::ids::EventId;

pub use contact::{Contact, FieldValue};
pub use eligibility::{ContactRepo, SqliteContactRepo};
pub use event::{Campaign, CampaignEvent, EventSpec, OffsetUnit, RelativeTo, StartMode};
pub use fires::{EventFire, FireResult, FireStore, NewFire, SqliteFireStore};
pub use scheduler::{CampaignScheduler, ReconcileStats};

/// Invalid campaign event definitions.
///
/// These are not retried: the event has to be fixed where it is defined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CampaignError {
    /// Offset unit code other than M, H, D or W.
    #[error("unknown offset unit: {0:?}")]
    UnknownOffsetUnit(String),

    /// Start mode code other than I, S or P.
    #[error("unknown start mode: {0:?}")]
    UnknownStartMode(String),

    /// Delivery hour outside 0..=23.
    #[error("invalid delivery hour: {0}")]
    InvalidDeliveryHour(u32),

    /// Wall-clock time that no policy could place in the org timezone.
    #[error("local time {local} cannot be resolved in {tz}")]
    UnresolvableLocalTime {
        /// Wall-clock time.
        local: NaiveDateTime,
        /// Zone name.
        tz: String,
    },

    /// The offset pushes the fire time outside the representable range.
    #[error("offset of {offset} {unit} is out of range")]
    OutOfRange {
        /// Offset amount.
        offset: i32,
        /// Offset unit.
        unit: OffsetUnit,
    },

    /// No active event with this id in the org's campaigns.
    #[error("no campaign event #{0}")]
    EventNotFound(EventId),
}
