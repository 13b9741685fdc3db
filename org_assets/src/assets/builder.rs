//! Snapshot assembly.
//!
//! Every non-flow category is one row in a table of (category, load, inherit)
//! slots. For each row the builder either calls the loader and indexes the
//! result, or copies the `Arc` from the previous snapshot. Flows get a fresh
//! empty [`FlowCache`] when reloaded and the previous one otherwise. The
//! first loader error aborts the build; nothing partial escapes.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use super::{
    AssetError, AssetLoader, AssetSet, Category, OrgAssets, Refresh,
    flow::{FlowCache, FlowLoader, FlowSource},
    share,
    types::*,
};
use crate::{campaigns::event::Campaign, ids::OrgId};

/// Where snapshots get their data.
#[derive(Clone)]
pub struct AssetSources {
    /// Category loader.
    pub assets: Arc<dyn AssetLoader>,
    /// Flow loader used on sub-cache misses.
    pub flows: Arc<dyn FlowLoader>,
    /// Bound for a single flow lookup.
    pub flow_timeout: Duration,
}

/// The loaded categories of one snapshot, each behind its own `Arc`.
#[derive(Clone, Default)]
pub(crate) struct Categories {
    pub(crate) environment: Arc<Environment>,
    pub(crate) channels: Arc<AssetSet<Channel>>,
    pub(crate) fields: Arc<AssetSet<Field>>,
    pub(crate) groups: Arc<AssetSet<Group>>,
    pub(crate) classifiers: Arc<AssetSet<Classifier>>,
    pub(crate) campaigns: Arc<AssetSet<Campaign>>,
    pub(crate) labels: Arc<AssetSet<Label>>,
    pub(crate) ticketers: Arc<AssetSet<Ticketer>>,
    pub(crate) topics: Arc<AssetSet<Topic>>,
    pub(crate) resthooks: Arc<AssetSet<Resthook>>,
    pub(crate) templates: Arc<AssetSet<Template>>,
    pub(crate) triggers: Arc<AssetSet<Trigger>>,
    pub(crate) globals: Arc<AssetSet<Global>>,
    pub(crate) locations: Arc<AssetSet<Location>>,
    pub(crate) users: Arc<AssetSet<User>>,
}

struct Slot {
    category: Category,
    load: fn(&dyn AssetLoader, OrgId, &mut Categories) -> anyhow::Result<()>,
    inherit: fn(&Categories, &mut Categories),
}

macro_rules! slot {
    ($category:ident, $field:ident, |$loader:ident, $org:ident| $load:expr) => {
        Slot {
            category: Category::$category,
            load: |$loader, $org, out| {
                out.$field = Arc::new($load);
                Ok(())
            },
            inherit: |prev, out| out.$field = Arc::clone(&prev.$field),
        }
    };
}

fn slots() -> [Slot; 15] {
    [
        slot!(Environment, environment, |l, org| l.environment(org)?),
        slot!(Channels, channels, |l, org| AssetSet::new(l.channels(org)?)),
        slot!(Fields, fields, |l, org| AssetSet::new(l.fields(org)?)),
        slot!(Groups, groups, |l, org| AssetSet::new(l.groups(org)?)),
        slot!(Classifiers, classifiers, |l, org| AssetSet::new(l.classifiers(org)?)),
        slot!(Campaigns, campaigns, |l, org| AssetSet::from_arcs(l.campaigns(org)?)),
        slot!(Labels, labels, |l, org| AssetSet::new(l.labels(org)?)),
        slot!(Ticketers, ticketers, |l, org| AssetSet::new(l.ticketers(org)?)),
        slot!(Topics, topics, |l, org| AssetSet::new(l.topics(org)?)),
        slot!(Resthooks, resthooks, |l, org| AssetSet::new(l.resthooks(org)?)),
        slot!(Templates, templates, |l, org| AssetSet::new(l.templates(org)?)),
        slot!(Triggers, triggers, |l, org| AssetSet::new(l.triggers(org)?)),
        slot!(Globals, globals, |l, org| AssetSet::new(l.globals(org)?)),
        slot!(Locations, locations, |l, org| AssetSet::new(l.locations(org)?)),
        slot!(Users, users, |l, org| AssetSet::new(l.users(org)?)),
    ]
}

/// Build a snapshot of `org_id`.
///
/// Without `prev` every category is loaded and the snapshot is stamped `now`.
/// With `prev`, only the categories in `refresh` are loaded, the rest are
/// shared with `prev`, and `prev`'s build time is kept.
pub fn build(
    sources: &AssetSources,
    org_id: OrgId,
    prev: Option<&OrgAssets>,
    refresh: Refresh,
    now: DateTime<Utc>,
) -> Result<OrgAssets, AssetError> {
    let mut cats = Categories::default();
    for slot in slots() {
        match prev {
            Some(prev) if !refresh.reloads(slot.category) => {
                (slot.inherit)(prev.categories(), &mut cats)
            }
            _ => (slot.load)(sources.assets.as_ref(), org_id, &mut cats).map_err(|err| {
                AssetError::Load {
                    org_id,
                    category: slot.category,
                    source: share(err),
                }
            })?,
        }
    }

    let cache = match prev {
        Some(prev) if !refresh.reloads(Category::Flows) => Arc::clone(&prev.flow_source().cache),
        _ => Arc::new(FlowCache::new()),
    };
    let flows = FlowSource {
        cache,
        loader: Arc::clone(&sources.flows),
        timeout: sources.flow_timeout,
    };
    let built_at = prev.map_or(now, |p| p.built_at());

    Ok(OrgAssets::assemble(org_id, built_at, cats, flows))
}
