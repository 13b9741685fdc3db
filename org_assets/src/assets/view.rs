//! Read-only capability view over a snapshot.
//!
//! This is what the flow engine sees: lookups by id, UUID or key for every
//! category, the org environment, flow access through the sub-cache, and a
//! few indexes derived from campaigns. A new view is built for every
//! snapshot, so the derived indexes always match the categories they came
//! from.

use std::{collections::HashMap, sync::Arc};

use chrono_tz::Tz;
use uuid::Uuid;

use super::{
    AssetError, AssetSet,
    builder::Categories,
    flow::{Flow, FlowRef, FlowSource},
    types::*,
};
use crate::{
    campaigns::event::{Campaign, CampaignEvent},
    ids::{EventId, FlowId, GroupId, OrgId},
};

/// Capability view of one org's assets.
pub struct AssetView {
    org_id: OrgId,
    pub(crate) cats: Categories,
    pub(crate) flows: FlowSource,
    campaigns_by_group: HashMap<GroupId, Vec<Arc<Campaign>>>,
    events_by_id: HashMap<EventId, Arc<CampaignEvent>>,
    events_by_field: HashMap<String, Vec<Arc<CampaignEvent>>>,
}

impl AssetView {
    pub(crate) fn new(org_id: OrgId, cats: Categories, flows: FlowSource) -> Self {
        let mut campaigns_by_group: HashMap<GroupId, Vec<Arc<Campaign>>> = HashMap::new();
        let mut events_by_id = HashMap::new();
        let mut events_by_field: HashMap<String, Vec<Arc<CampaignEvent>>> = HashMap::new();

        for campaign in cats.campaigns.iter() {
            campaigns_by_group
                .entry(campaign.group_id)
                .or_default()
                .push(Arc::clone(campaign));
            for event in campaign.events() {
                events_by_id.insert(event.id, Arc::clone(event));
                events_by_field
                    .entry(event.relative_to.key().to_string())
                    .or_default()
                    .push(Arc::clone(event));
            }
        }

        Self {
            org_id,
            cats,
            flows,
            campaigns_by_group,
            events_by_id,
            events_by_field,
        }
    }

    /// Org this view belongs to.
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Org environment.
    pub fn environment(&self) -> &Environment {
        &self.cats.environment
    }

    /// Org timezone.
    pub fn timezone(&self) -> Tz {
        self.cats.environment.timezone
    }

    /// Channels.
    pub fn channels(&self) -> &AssetSet<Channel> {
        &self.cats.channels
    }

    /// Fields, keyed by field key.
    pub fn fields(&self) -> &AssetSet<Field> {
        &self.cats.fields
    }

    /// Groups.
    pub fn groups(&self) -> &AssetSet<Group> {
        &self.cats.groups
    }

    /// Classifiers.
    pub fn classifiers(&self) -> &AssetSet<Classifier> {
        &self.cats.classifiers
    }

    /// Campaigns.
    pub fn campaigns(&self) -> &AssetSet<Campaign> {
        &self.cats.campaigns
    }

    /// Labels.
    pub fn labels(&self) -> &AssetSet<Label> {
        &self.cats.labels
    }

    /// Ticketers.
    pub fn ticketers(&self) -> &AssetSet<Ticketer> {
        &self.cats.ticketers
    }

    /// Topics.
    pub fn topics(&self) -> &AssetSet<Topic> {
        &self.cats.topics
    }

    /// Resthooks, keyed by slug.
    pub fn resthooks(&self) -> &AssetSet<Resthook> {
        &self.cats.resthooks
    }

    /// Templates.
    pub fn templates(&self) -> &AssetSet<Template> {
        &self.cats.templates
    }

    /// Triggers.
    pub fn triggers(&self) -> &AssetSet<Trigger> {
        &self.cats.triggers
    }

    /// Globals, keyed by key.
    pub fn globals(&self) -> &AssetSet<Global> {
        &self.cats.globals
    }

    /// Locations, keyed by OSM id.
    pub fn locations(&self) -> &AssetSet<Location> {
        &self.cats.locations
    }

    /// Users, keyed by email.
    pub fn users(&self) -> &AssetSet<User> {
        &self.cats.users
    }

    /// Campaign event by id, across all campaigns.
    pub fn campaign_event(&self, id: EventId) -> Option<&Arc<CampaignEvent>> {
        self.events_by_id.get(&id)
    }

    /// Campaigns scoped to `group_id`.
    pub fn campaigns_for_group(&self, group_id: GroupId) -> &[Arc<Campaign>] {
        self.campaigns_by_group
            .get(&group_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Events relative to `key` (`created_on`, `last_seen_on` or a field key).
    pub fn events_relative_to(&self, key: &str) -> &[Arc<CampaignEvent>] {
        self.events_by_field.get(key).map_or(&[], Vec::as_slice)
    }

    /// Flow by reference, through the snapshot's flow cache.
    pub fn flow(&self, flow: &FlowRef) -> Result<Arc<Flow>, AssetError> {
        self.flows.get(self.org_id, flow)
    }

    /// Flow by UUID.
    pub fn flow_by_uuid(&self, uuid: Uuid) -> Result<Arc<Flow>, AssetError> {
        self.flow(&FlowRef::Uuid(uuid))
    }

    /// Flow by id.
    pub fn flow_by_id(&self, id: FlowId) -> Result<Arc<Flow>, AssetError> {
        self.flow(&FlowRef::Id(id))
    }
}
