//! Per-org asset snapshots.
//!
//! An [`OrgAssets`] value holds every asset category for one org at a point in
//! time. Categories are loaded through an injected [`AssetLoader`] and are
//! immutable once loaded, so a later snapshot can share them by reference with
//! an earlier one. Flows are the exception: they are fetched lazily, one at a
//! time, into a small locked sub-cache (see [`flow`]).
//!
//! Layout:
//! - [`refresh`]: the [`Refresh`] bit-set naming categories to reload.
//! - [`types`]: the typed asset records.
//! - [`loader`]: the category loader contract plus an in-memory implementation.
//! - [`builder`]: assembles a snapshot from loaders and/or a previous snapshot.
//! - [`snapshot`]: the snapshot itself.
//! - [`view`]: the read-only capability view handed to the flow engine.

pub mod builder;
pub mod flow;
pub mod loader;
pub mod refresh;
pub mod snapshot;
pub mod types;
pub mod view;

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::ids::OrgId;

pub use builder::AssetSources;
pub use flow::{Flow, FlowCache, FlowLoader, FlowRef, FlowType, SqliteFlowLoader};
pub use loader::{AssetLoader, StaticAssets};
pub use refresh::Refresh;
pub use snapshot::OrgAssets;
pub use view::AssetView;

/// Error shared between every caller waiting on the same load.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap an [`anyhow::Error`] so it can be cloned out to several callers.
pub(crate) fn share(err: anyhow::Error) -> SharedError {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
    Arc::from(boxed)
}

/// Errors raised while building snapshots or resolving flows.
///
/// Cloneable: a single failed build is reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    /// A category loader failed; the whole build was abandoned.
    #[error("error loading {category} for org #{org_id}")]
    Load {
        /// Org being built.
        org_id: OrgId,
        /// Category whose loader failed.
        category: Category,
        /// Loader error.
        #[source]
        source: SharedError,
    },

    /// The store has no active flow with this identifier.
    #[error("no active flow {flow} in org #{org_id}")]
    FlowNotFound {
        /// Org searched.
        org_id: OrgId,
        /// Identifier that was looked up.
        flow: FlowRef,
    },

    /// The flow lookup itself failed (query error, timeout, bad definition).
    #[error("error loading flow {flow} in org #{org_id}")]
    FlowLoad {
        /// Org searched.
        org_id: OrgId,
        /// Identifier that was looked up.
        flow: FlowRef,
        /// Underlying error.
        #[source]
        source: SharedError,
    },

    /// A simulation replacement names a flow the org does not have.
    #[error("cannot replace unknown flow {uuid} in org #{org_id}")]
    UnknownFlow {
        /// Org being cloned.
        org_id: OrgId,
        /// UUID of the replacement.
        uuid: Uuid,
    },
}

impl AssetError {
    /// True for "no such flow", as opposed to a failed lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::FlowNotFound { .. })
    }
}

/// Asset categories, in the order they are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Org environment (timezone, languages, country, redaction).
    Environment,
    /// Messaging channels.
    Channels,
    /// Contact fields, user and system.
    Fields,
    /// Contact groups.
    Groups,
    /// NLU classifiers.
    Classifiers,
    /// Campaigns with their events.
    Campaigns,
    /// Message labels.
    Labels,
    /// Ticketing services.
    Ticketers,
    /// Ticket topics.
    Topics,
    /// Resthooks.
    Resthooks,
    /// Message templates.
    Templates,
    /// Triggers.
    Triggers,
    /// Global variables.
    Globals,
    /// Administrative boundaries.
    Locations,
    /// Workspace users.
    Users,
    /// Flows (lazy).
    Flows,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Environment => "environment",
            Category::Channels => "channels",
            Category::Fields => "fields",
            Category::Groups => "groups",
            Category::Classifiers => "classifiers",
            Category::Campaigns => "campaigns",
            Category::Labels => "labels",
            Category::Ticketers => "ticketers",
            Category::Topics => "topics",
            Category::Resthooks => "resthooks",
            Category::Templates => "templates",
            Category::Triggers => "triggers",
            Category::Globals => "globals",
            Category::Locations => "locations",
            Category::Users => "users",
            Category::Flows => "flows",
        };
        f.write_str(s)
    }
}

/// Something that can live in an [`AssetSet`].
pub trait Asset: Send + Sync + 'static {
    /// Numeric id type.
    type Id: Copy + Eq + Hash + fmt::Debug + Send + Sync;

    /// Numeric id, unique within the org.
    fn id(&self) -> Self::Id;

    /// UUID, for categories that have one.
    fn uuid(&self) -> Option<Uuid> {
        None
    }

    /// Secondary string key (field key, resthook slug, email...), if any.
    fn key(&self) -> Option<&str> {
        None
    }
}

/// One loaded category: items in load order plus by-id, by-uuid and by-key indexes.
pub struct AssetSet<T: Asset> {
    by_id: IndexMap<T::Id, Arc<T>>,
    by_uuid: HashMap<Uuid, T::Id>,
    by_key: HashMap<String, T::Id>,
}

impl<T: Asset> AssetSet<T> {
    /// Index freshly loaded items.
    pub fn new(items: Vec<T>) -> Self {
        Self::from_arcs(items.into_iter().map(Arc::new).collect())
    }

    /// Index items that are already shared.
    ///
    /// Later duplicates of an id replace earlier ones, keeping the original position.
    pub fn from_arcs(items: Vec<Arc<T>>) -> Self {
        let mut by_id = IndexMap::with_capacity(items.len());
        let mut by_uuid = HashMap::new();
        let mut by_key = HashMap::new();
        for item in items {
            let id = item.id();
            if let Some(uuid) = item.uuid() {
                by_uuid.insert(uuid, id);
            }
            if let Some(key) = item.key() {
                by_key.insert(key.to_string(), id);
            }
            by_id.insert(id, item);
        }
        Self {
            by_id,
            by_uuid,
            by_key,
        }
    }

    /// Empty set.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Items in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.by_id.values()
    }

    /// Lookup by numeric id.
    pub fn get(&self, id: T::Id) -> Option<&Arc<T>> {
        self.by_id.get(&id)
    }

    /// Lookup by UUID.
    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<&Arc<T>> {
        self.by_uuid.get(&uuid).and_then(|id| self.by_id.get(id))
    }

    /// Lookup by secondary key.
    pub fn get_by_key(&self, key: &str) -> Option<&Arc<T>> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    /// Copy of this set with `extra` appended (same-id items replaced).
    pub fn with_extra(&self, extra: Vec<T>) -> Self {
        let mut items: Vec<Arc<T>> = self.by_id.values().cloned().collect();
        items.extend(extra.into_iter().map(Arc::new));
        Self::from_arcs(items)
    }
}

impl<T: Asset> Default for AssetSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Asset> fmt::Debug for AssetSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.by_id.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::types::Label;
    use super::*;
    use crate::ids::LabelId;

    fn label(id: i32, name: &str) -> Label {
        Label {
            id: LabelId(id),
            uuid: Uuid::new_v4(),
            name: name.into(),
        }
    }

    #[test]
    fn asset_set_indexes_by_id_and_uuid() {
        let a = label(1, "Spam");
        let b = label(2, "Important");
        let b_uuid = b.uuid;
        let set = AssetSet::new(vec![a, b]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(LabelId(1)).unwrap().name, "Spam");
        assert_eq!(set.get_by_uuid(b_uuid).unwrap().name, "Important");
        assert!(set.get(LabelId(3)).is_none());
        let names: Vec<_> = set.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Spam", "Important"]);
    }

    #[test]
    fn with_extra_leaves_source_untouched() {
        let set = AssetSet::new(vec![label(1, "Spam")]);
        let bigger = set.with_extra(vec![label(2, "Test")]);
        assert_eq!(set.len(), 1);
        assert_eq!(bigger.len(), 2);
        assert!(Arc::ptr_eq(
            set.get(LabelId(1)).unwrap(),
            bigger.get(LabelId(1)).unwrap()
        ));
    }

    #[test]
    fn load_error_keeps_its_source() {
        let err = AssetError::Load {
            org_id: OrgId(7),
            category: Category::Groups,
            source: share(anyhow::anyhow!("connection reset")),
        };
        assert_eq!(err.to_string(), "error loading groups for org #7");
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "connection reset");
        assert!(!err.is_not_found());
    }
}
