//! Per-org asset snapshots and campaign event scheduling.
//!
//! - [`cache::AssetCache`] serves immutable [`assets::OrgAssets`] snapshots
//!   with a TTL, selective per-category refresh and single-flight full builds.
//! - [`campaigns::CampaignScheduler`] keeps campaign event fires in SQLite in
//!   line with group membership, field values and event definitions.

#![deny(missing_docs)]

pub mod assets;
pub mod cache;
pub mod campaigns;
pub mod clock;
pub mod config;
pub mod db;
pub mod ids;
pub mod models;
#[allow(missing_docs)]
pub mod schema;
pub mod schedule;
pub mod tz;
