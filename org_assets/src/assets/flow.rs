//! Lazily populated flow sub-cache.
//!
//! Flow definitions are the largest and least often needed assets, so a
//! snapshot never loads them up front. The first lookup of a flow goes to the
//! [`FlowLoader`] with a bounded wait and the result is kept in two maps (by
//! UUID and by id) behind a reader/writer lock. Every snapshot built without
//! [`Refresh::FLOWS`](super::Refresh::FLOWS) shares its predecessor's
//! [`FlowCache`], including whatever was already fetched.
//!
//! Lookups:
//! - hit: read lock, clone the `Arc`, done.
//! - miss: drop the read lock, call the loader, take the write lock and insert
//!   into both maps.
//! - `Ok(None)` from the loader surfaces as [`AssetError::FlowNotFound`], any
//!   other failure as [`AssetError::FlowLoad`].

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use anyhow::Context;
use diesel::{RunQueryDsl, prelude::*, sql_query};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AssetError, share};
use crate::{
    db::connection::connect_sqlite,
    ids::{FlowId, OrgId},
    models::FlowRow,
    schema::flows,
};

/// Flow flavour, stored as a one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Text messaging ("M").
    Messaging,
    /// Interactive voice ("V").
    Voice,
    /// No user interaction ("B").
    Background,
    /// Offline surveys ("S").
    Survey,
}

impl FlowType {
    /// Parse the storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Self::Messaging),
            "V" => Some(Self::Voice),
            "B" => Some(Self::Background),
            "S" => Some(Self::Survey),
            _ => None,
        }
    }

    /// Storage code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Messaging => "M",
            Self::Voice => "V",
            Self::Background => "B",
            Self::Survey => "S",
        }
    }
}

/// A flow and its engine definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Flow id.
    pub id: FlowId,
    /// Flow UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Flavour.
    pub flow_type: FlowType,
    /// Definition as the engine consumes it.
    pub definition: serde_json::Value,
}

impl TryFrom<FlowRow> for Flow {
    type Error = anyhow::Error;

    fn try_from(row: FlowRow) -> anyhow::Result<Self> {
        let uuid = Uuid::parse_str(&row.uuid)
            .with_context(|| format!("bad flow uuid: {}", row.uuid))?;
        let flow_type = FlowType::from_code(&row.flow_type).with_context(|| {
            format!("unknown flow type {:?} for flow #{}", row.flow_type, row.id)
        })?;
        let definition = serde_json::from_str(&row.definition)
            .with_context(|| format!("invalid definition for flow #{}", row.id))?;
        Ok(Self {
            id: FlowId(row.id),
            uuid,
            name: row.name,
            flow_type,
            definition,
        })
    }
}

/// How a flow is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowRef {
    /// By UUID (what flow definitions use).
    Uuid(Uuid),
    /// By numeric id (what triggers and campaign events use).
    Id(FlowId),
}

impl fmt::Display for FlowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowRef::Uuid(uuid) => write!(f, "{uuid}"),
            FlowRef::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// Fetches one flow from the backing store.
pub trait FlowLoader: Send + Sync {
    /// Load the active flow `flow` of `org_id`, waiting at most `timeout`.
    ///
    /// `Ok(None)` means the org has no active flow with that identifier.
    fn load_flow(
        &self,
        org_id: OrgId,
        flow: &FlowRef,
        timeout: Duration,
    ) -> anyhow::Result<Option<Flow>>;
}

#[derive(Default)]
struct FlowMaps {
    by_uuid: HashMap<Uuid, Arc<Flow>>,
    by_id: HashMap<FlowId, Arc<Flow>>,
}

/// Flows fetched so far for one snapshot lineage.
#[derive(Default)]
pub struct FlowCache {
    maps: RwLock<FlowMaps>,
}

impl fmt::Debug for FlowCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowCache").field("len", &self.len()).finish()
    }
}

impl FlowCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached flows.
    pub fn len(&self) -> usize {
        self.maps.read().unwrap_or_else(PoisonError::into_inner).by_id.len()
    }

    /// True when nothing has been fetched yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached flow, without touching the loader.
    pub fn cached(&self, flow: &FlowRef) -> Option<Arc<Flow>> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        match flow {
            FlowRef::Uuid(uuid) => maps.by_uuid.get(uuid).cloned(),
            FlowRef::Id(id) => maps.by_id.get(id).cloned(),
        }
    }

    /// Insert (or replace) a flow under both its UUID and id.
    pub fn insert(&self, flow: Arc<Flow>) {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        maps.by_uuid.insert(flow.uuid, Arc::clone(&flow));
        maps.by_id.insert(flow.id, flow);
    }

    /// Cached flow, or load it through `loader` and cache it.
    pub fn get_or_load(
        &self,
        org_id: OrgId,
        flow: &FlowRef,
        loader: &dyn FlowLoader,
        timeout: Duration,
    ) -> Result<Arc<Flow>, AssetError> {
        if let Some(hit) = self.cached(flow) {
            debug!(org_id = org_id.0, %flow, "flow cache hit");
            return Ok(hit);
        }

        match loader.load_flow(org_id, flow, timeout) {
            Ok(Some(loaded)) => {
                let loaded = Arc::new(loaded);
                self.insert(Arc::clone(&loaded));
                debug!(org_id = org_id.0, %flow, "flow loaded");
                Ok(loaded)
            }
            Ok(None) => Err(AssetError::FlowNotFound {
                org_id,
                flow: *flow,
            }),
            Err(err) => {
                warn!(org_id = org_id.0, %flow, error = %err, "flow load failed");
                Err(AssetError::FlowLoad {
                    org_id,
                    flow: *flow,
                    source: share(err),
                })
            }
        }
    }
}

/// A snapshot's flow cache together with where misses are loaded from.
#[derive(Clone)]
pub(crate) struct FlowSource {
    pub(crate) cache: Arc<FlowCache>,
    pub(crate) loader: Arc<dyn FlowLoader>,
    pub(crate) timeout: Duration,
}

impl FlowSource {
    pub(crate) fn get(&self, org_id: OrgId, flow: &FlowRef) -> Result<Arc<Flow>, AssetError> {
        self.cache
            .get_or_load(org_id, flow, self.loader.as_ref(), self.timeout)
    }
}

/// [`FlowLoader`] reading the `flows` table of a SQLite database.
///
/// Opens a connection per lookup; the lookup's timeout becomes the
/// connection's `busy_timeout`, so a locked database fails the lookup instead
/// of blocking past the bound.
#[derive(Debug, Clone)]
pub struct SqliteFlowLoader {
    database_url: String,
}

impl SqliteFlowLoader {
    /// Loader for the database at `database_url`.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

impl FlowLoader for SqliteFlowLoader {
    fn load_flow(
        &self,
        org_id: OrgId,
        flow: &FlowRef,
        timeout: Duration,
    ) -> anyhow::Result<Option<Flow>> {
        let mut conn = connect_sqlite(&self.database_url)?;
        sql_query(format!("PRAGMA busy_timeout={};", timeout.as_millis())).execute(&mut conn)?;

        let active = flows::table
            .filter(flows::org_id.eq(org_id.0))
            .filter(flows::is_active.eq(true));
        let row: Option<FlowRow> = match flow {
            FlowRef::Uuid(uuid) => active
                .filter(flows::uuid.eq(uuid.to_string()))
                .select(FlowRow::as_select())
                .first(&mut conn)
                .optional()?,
            FlowRef::Id(id) => active
                .filter(flows::id.eq(id.0))
                .select(FlowRow::as_select())
                .first(&mut conn)
                .optional()?,
        };
        row.map(Flow::try_from).transpose()
    }
}
