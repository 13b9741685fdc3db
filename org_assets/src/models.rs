//! Diesel row types for the SQLite tables in [`crate::schema`].
//!
//! Timestamps are RFC-3339 UTC strings with millisecond precision (see
//! [`crate::tz::to_rfc3339_millis`]); conversion to domain types happens in
//! the stores that read these rows.
//!
//! The `New*` structs double as seeding helpers for tests and fixtures:
//!
//! ```no_run
//! use diesel::prelude::*;
//! use org_assets::{models::*, schema};
//!
//! fn seed(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
//!     diesel::insert_into(schema::contacts::table)
//!         .values(NewContact {
//!             id: 1,
//!             org_id: 1,
//!             uuid: "6393abc0-283d-4c9b-a1b3-641a035c34bf",
//!             created_on: "2024-01-01T08:15:00.000Z",
//!             last_seen_on: None,
//!             is_active: true,
//!         })
//!         .execute(conn)?;
//!     diesel::insert_into(schema::contact_group_members::table)
//!         .values(NewGroupMember { group_id: 7, contact_id: 1 })
//!         .execute(conn)?;
//!     Ok(())
//! }
//! ```

use diesel::prelude::*;

// ----------------------- flows -----------------------

/// A row of [`crate::schema::flows`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::flows)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FlowRow {
    /// Flow id.
    pub id: i32,
    /// Owning org.
    pub org_id: i32,
    /// UUID as text.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// One-letter flow type code.
    pub flow_type: String,
    /// JSON definition.
    pub definition: String,
    /// Inactive flows are invisible to lookups.
    pub is_active: bool,
}

/// Insertable flow.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::flows)]
pub struct NewFlow<'a> {
    /// Flow id.
    pub id: i32,
    /// Owning org.
    pub org_id: i32,
    /// UUID as text.
    pub uuid: &'a str,
    /// Display name.
    pub name: &'a str,
    /// One-letter flow type code.
    pub flow_type: &'a str,
    /// JSON definition.
    pub definition: &'a str,
    /// Active flag.
    pub is_active: bool,
}

// ----------------------- contacts -----------------------

/// A row of [`crate::schema::contacts`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contacts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContactRow {
    /// Contact id.
    pub id: i32,
    /// Owning org.
    pub org_id: i32,
    /// UUID as text.
    pub uuid: String,
    /// RFC-3339 creation time.
    pub created_on: String,
    /// RFC-3339 last activity.
    pub last_seen_on: Option<String>,
    /// Inactive contacts are never scheduled.
    pub is_active: bool,
}

/// Insertable contact.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::contacts)]
pub struct NewContact<'a> {
    /// Contact id.
    pub id: i32,
    /// Owning org.
    pub org_id: i32,
    /// UUID as text.
    pub uuid: &'a str,
    /// RFC-3339 creation time.
    pub created_on: &'a str,
    /// RFC-3339 last activity.
    pub last_seen_on: Option<&'a str>,
    /// Active flag.
    pub is_active: bool,
}

/// Insertable group membership.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = crate::schema::contact_group_members)]
pub struct NewGroupMember {
    /// Group id.
    pub group_id: i32,
    /// Contact id.
    pub contact_id: i32,
}

/// A row of [`crate::schema::contact_field_values`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contact_field_values)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FieldValueRow {
    /// Contact id.
    pub contact_id: i32,
    /// Field key.
    pub field_key: String,
    /// Raw text.
    pub text_value: String,
    /// RFC-3339 value for date fields.
    pub datetime_value: Option<String>,
}

/// Insertable field value.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::contact_field_values)]
pub struct NewFieldValue<'a> {
    /// Contact id.
    pub contact_id: i32,
    /// Field key.
    pub field_key: &'a str,
    /// Raw text.
    pub text_value: &'a str,
    /// RFC-3339 value for date fields.
    pub datetime_value: Option<&'a str>,
}

// ----------------------- event fires -----------------------

/// A row of [`crate::schema::campaign_event_fires`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::campaign_event_fires)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FireRow {
    /// Fire id.
    pub id: i32,
    /// Campaign event.
    pub event_id: i32,
    /// Contact.
    pub contact_id: i32,
    /// RFC-3339 scheduled time.
    pub scheduled: String,
    /// RFC-3339 fired time, `None` while pending.
    pub fired: Option<String>,
    /// "F" fired or "S" skipped, once fired.
    pub fired_result: Option<String>,
}

/// Insertable pending fire.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::campaign_event_fires)]
pub struct NewFireRow {
    /// Campaign event.
    pub event_id: i32,
    /// Contact.
    pub contact_id: i32,
    /// RFC-3339 scheduled time.
    pub scheduled: String,
}
