//! The per-org snapshot.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AssetError, AssetSet, AssetView,
    builder::Categories,
    flow::{Flow, FlowCache, FlowRef, FlowSource},
    types::*,
};
use crate::{
    campaigns::event::Campaign,
    ids::{FlowId, OrgId},
};

/// Every asset category of one org, as of `built_at`.
///
/// Immutable once built apart from the flow sub-cache. Cheap to share: the
/// cache hands out `Arc<OrgAssets>` and callers only ever read.
pub struct OrgAssets {
    org_id: OrgId,
    built_at: DateTime<Utc>,
    view: Arc<AssetView>,
}

impl fmt::Debug for OrgAssets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgAssets")
            .field("org_id", &self.org_id)
            .field("built_at", &self.built_at)
            .finish_non_exhaustive()
    }
}

macro_rules! category_accessors {
    ($($(#[$doc:meta])* $name:ident: $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> &Arc<$ty> {
                &self.view.cats.$name
            }
        )*
    };
}

impl OrgAssets {
    pub(crate) fn assemble(
        org_id: OrgId,
        built_at: DateTime<Utc>,
        cats: Categories,
        flows: FlowSource,
    ) -> Self {
        Self {
            org_id,
            built_at,
            view: Arc::new(AssetView::new(org_id, cats, flows)),
        }
    }

    /// Org id.
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// When the oldest category in this snapshot was loaded.
    ///
    /// A partial refresh keeps its predecessor's value.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Capability view for the flow engine.
    pub fn view(&self) -> &Arc<AssetView> {
        &self.view
    }

    pub(crate) fn categories(&self) -> &Categories {
        &self.view.cats
    }

    pub(crate) fn flow_source(&self) -> &FlowSource {
        &self.view.flows
    }

    category_accessors! {
        /// Environment.
        environment: Environment;
        /// Channels.
        channels: AssetSet<Channel>;
        /// Fields.
        fields: AssetSet<Field>;
        /// Groups.
        groups: AssetSet<Group>;
        /// Classifiers.
        classifiers: AssetSet<Classifier>;
        /// Campaigns.
        campaigns: AssetSet<Campaign>;
        /// Labels.
        labels: AssetSet<Label>;
        /// Ticketers.
        ticketers: AssetSet<Ticketer>;
        /// Topics.
        topics: AssetSet<Topic>;
        /// Resthooks.
        resthooks: AssetSet<Resthook>;
        /// Templates.
        templates: AssetSet<Template>;
        /// Triggers.
        triggers: AssetSet<Trigger>;
        /// Globals.
        globals: AssetSet<Global>;
        /// Locations.
        locations: AssetSet<Location>;
        /// Users.
        users: AssetSet<User>;
    }

    /// Flow sub-cache (shared with snapshots built from this one unless they
    /// reloaded flows).
    pub fn flow_cache(&self) -> &Arc<FlowCache> {
        &self.view.flows.cache
    }

    /// Flow by UUID, loading it on first use.
    pub fn flow_by_uuid(&self, uuid: Uuid) -> Result<Arc<Flow>, AssetError> {
        self.view.flow(&FlowRef::Uuid(uuid))
    }

    /// Flow by id, loading it on first use.
    pub fn flow_by_id(&self, id: FlowId) -> Result<Arc<Flow>, AssetError> {
        self.view.flow(&FlowRef::Id(id))
    }

    /// Copy of this snapshot for running a simulation.
    ///
    /// Every category is shared except flows: the clone starts with an empty
    /// flow cache, then each `(uuid, definition)` replacement is loaded through
    /// it and swapped for the given definition. `test_channels` are appended
    /// to the channels. `self` is not modified.
    pub fn clone_for_simulation(
        &self,
        replacements: &[(Uuid, serde_json::Value)],
        test_channels: Vec<Channel>,
    ) -> Result<OrgAssets, AssetError> {
        let mut cats = self.view.cats.clone();
        if !test_channels.is_empty() {
            cats.channels = Arc::new(cats.channels.with_extra(test_channels));
        }

        let flows = FlowSource {
            cache: Arc::new(FlowCache::new()),
            ..self.view.flows.clone()
        };
        for (uuid, definition) in replacements {
            let original = flows
                .get(self.org_id, &FlowRef::Uuid(*uuid))
                .map_err(|err| match err {
                    AssetError::FlowNotFound { org_id, .. } => AssetError::UnknownFlow {
                        org_id,
                        uuid: *uuid,
                    },
                    other => other,
                })?;
            flows.cache.insert(Arc::new(Flow {
                definition: definition.clone(),
                ..Flow::clone(&original)
            }));
        }

        Ok(OrgAssets::assemble(self.org_id, self.built_at, cats, flows))
    }
}
