//! Category loader contract and an in-memory implementation.
//!
//! [`AssetLoader`] has one method per category. Each returns the complete,
//! deterministically ordered set for an org or an error; the builder never
//! asks for partial results. Flows are not part of this trait, they go
//! through [`FlowLoader`](super::FlowLoader) one at a time.
//!
//! [`StaticAssets`] keeps per-org data in memory. It backs tests and
//! simulations, counts calls per category and can be told to fail or to
//! stall a category to exercise the cache's failure and concurrency paths.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use dashmap::DashMap;

use super::{
    Category,
    flow::{Flow, FlowLoader, FlowRef},
    types::*,
};
use crate::{campaigns::event::Campaign, ids::OrgId};

/// Loads each asset category for one org.
pub trait AssetLoader: Send + Sync {
    /// Org environment.
    fn environment(&self, org_id: OrgId) -> anyhow::Result<Environment>;
    /// Active channels.
    fn channels(&self, org_id: OrgId) -> anyhow::Result<Vec<Channel>>;
    /// User and system fields.
    fn fields(&self, org_id: OrgId) -> anyhow::Result<Vec<Field>>;
    /// Active groups.
    fn groups(&self, org_id: OrgId) -> anyhow::Result<Vec<Group>>;
    /// Classifiers.
    fn classifiers(&self, org_id: OrgId) -> anyhow::Result<Vec<Classifier>>;
    /// Active campaigns with their events.
    fn campaigns(&self, org_id: OrgId) -> anyhow::Result<Vec<Arc<Campaign>>>;
    /// Labels.
    fn labels(&self, org_id: OrgId) -> anyhow::Result<Vec<Label>>;
    /// Ticketers.
    fn ticketers(&self, org_id: OrgId) -> anyhow::Result<Vec<Ticketer>>;
    /// Topics.
    fn topics(&self, org_id: OrgId) -> anyhow::Result<Vec<Topic>>;
    /// Resthooks.
    fn resthooks(&self, org_id: OrgId) -> anyhow::Result<Vec<Resthook>>;
    /// Templates.
    fn templates(&self, org_id: OrgId) -> anyhow::Result<Vec<Template>>;
    /// Triggers.
    fn triggers(&self, org_id: OrgId) -> anyhow::Result<Vec<Trigger>>;
    /// Globals.
    fn globals(&self, org_id: OrgId) -> anyhow::Result<Vec<Global>>;
    /// Locations.
    fn locations(&self, org_id: OrgId) -> anyhow::Result<Vec<Location>>;
    /// Users.
    fn users(&self, org_id: OrgId) -> anyhow::Result<Vec<User>>;
}

/// Everything [`StaticAssets`] knows about one org.
#[derive(Debug, Clone, Default)]
pub struct OrgData {
    /// Environment.
    pub environment: Environment,
    /// Channels.
    pub channels: Vec<Channel>,
    /// Fields.
    pub fields: Vec<Field>,
    /// Groups.
    pub groups: Vec<Group>,
    /// Classifiers.
    pub classifiers: Vec<Classifier>,
    /// Campaigns.
    pub campaigns: Vec<Arc<Campaign>>,
    /// Labels.
    pub labels: Vec<Label>,
    /// Ticketers.
    pub ticketers: Vec<Ticketer>,
    /// Topics.
    pub topics: Vec<Topic>,
    /// Resthooks.
    pub resthooks: Vec<Resthook>,
    /// Templates.
    pub templates: Vec<Template>,
    /// Triggers.
    pub triggers: Vec<Trigger>,
    /// Globals.
    pub globals: Vec<Global>,
    /// Locations.
    pub locations: Vec<Location>,
    /// Users.
    pub users: Vec<User>,
    /// Flows, served through [`FlowLoader`].
    pub flows: Vec<Flow>,
}

/// In-memory [`AssetLoader`] and [`FlowLoader`].
#[derive(Default)]
pub struct StaticAssets {
    orgs: DashMap<OrgId, OrgData>,
    calls: DashMap<Category, usize>,
    failures: DashMap<Category, String>,
    delay_ms: AtomicU64,
}

impl StaticAssets {
    /// No orgs yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything known about `org_id`.
    pub fn insert_org(&self, org_id: OrgId, data: OrgData) {
        self.orgs.insert(org_id, data);
    }

    /// Edit `org_id`'s data in place (creating it if needed).
    pub fn update(&self, org_id: OrgId, f: impl FnOnce(&mut OrgData)) {
        f(&mut self.orgs.entry(org_id).or_default());
    }

    /// How many times `category` has been loaded, across orgs.
    pub fn load_count(&self, category: Category) -> usize {
        self.calls.get(&category).map_or(0, |n| *n)
    }

    /// Make every load of `category` fail with `message` until cleared.
    pub fn fail(&self, category: Category, message: impl Into<String>) {
        self.failures.insert(category, message.into());
    }

    /// Stop failing `category`.
    pub fn clear_failure(&self, category: Category) {
        self.failures.remove(&category);
    }

    /// Sleep this long in every category load.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    fn load<T>(
        &self,
        org_id: OrgId,
        category: Category,
        read: impl FnOnce(&OrgData) -> T,
    ) -> anyhow::Result<T> {
        *self.calls.entry(category).or_default() += 1;

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        if let Some(message) = self.failures.get(&category) {
            anyhow::bail!("{}", message.value());
        }
        let Some(data) = self.orgs.get(&org_id) else {
            anyhow::bail!("org #{org_id} not found");
        };
        Ok(read(&data))
    }
}

impl AssetLoader for StaticAssets {
    fn environment(&self, org_id: OrgId) -> anyhow::Result<Environment> {
        self.load(org_id, Category::Environment, |d| d.environment.clone())
    }
    fn channels(&self, org_id: OrgId) -> anyhow::Result<Vec<Channel>> {
        self.load(org_id, Category::Channels, |d| d.channels.clone())
    }
    fn fields(&self, org_id: OrgId) -> anyhow::Result<Vec<Field>> {
        self.load(org_id, Category::Fields, |d| d.fields.clone())
    }
    fn groups(&self, org_id: OrgId) -> anyhow::Result<Vec<Group>> {
        self.load(org_id, Category::Groups, |d| d.groups.clone())
    }
    fn classifiers(&self, org_id: OrgId) -> anyhow::Result<Vec<Classifier>> {
        self.load(org_id, Category::Classifiers, |d| d.classifiers.clone())
    }
    fn campaigns(&self, org_id: OrgId) -> anyhow::Result<Vec<Arc<Campaign>>> {
        self.load(org_id, Category::Campaigns, |d| d.campaigns.clone())
    }
    fn labels(&self, org_id: OrgId) -> anyhow::Result<Vec<Label>> {
        self.load(org_id, Category::Labels, |d| d.labels.clone())
    }
    fn ticketers(&self, org_id: OrgId) -> anyhow::Result<Vec<Ticketer>> {
        self.load(org_id, Category::Ticketers, |d| d.ticketers.clone())
    }
    fn topics(&self, org_id: OrgId) -> anyhow::Result<Vec<Topic>> {
        self.load(org_id, Category::Topics, |d| d.topics.clone())
    }
    fn resthooks(&self, org_id: OrgId) -> anyhow::Result<Vec<Resthook>> {
        self.load(org_id, Category::Resthooks, |d| d.resthooks.clone())
    }
    fn templates(&self, org_id: OrgId) -> anyhow::Result<Vec<Template>> {
        self.load(org_id, Category::Templates, |d| d.templates.clone())
    }
    fn triggers(&self, org_id: OrgId) -> anyhow::Result<Vec<Trigger>> {
        self.load(org_id, Category::Triggers, |d| d.triggers.clone())
    }
    fn globals(&self, org_id: OrgId) -> anyhow::Result<Vec<Global>> {
        self.load(org_id, Category::Globals, |d| d.globals.clone())
    }
    fn locations(&self, org_id: OrgId) -> anyhow::Result<Vec<Location>> {
        self.load(org_id, Category::Locations, |d| d.locations.clone())
    }
    fn users(&self, org_id: OrgId) -> anyhow::Result<Vec<User>> {
        self.load(org_id, Category::Users, |d| d.users.clone())
    }
}

impl FlowLoader for StaticAssets {
    fn load_flow(
        &self,
        org_id: OrgId,
        flow: &FlowRef,
        _timeout: Duration,
    ) -> anyhow::Result<Option<Flow>> {
        self.load(org_id, Category::Flows, |d| {
            d.flows
                .iter()
                .find(|f| match flow {
                    FlowRef::Uuid(uuid) => f.uuid == *uuid,
                    FlowRef::Id(id) => f.id == *id,
                })
                .cloned()
        })
    }
}
