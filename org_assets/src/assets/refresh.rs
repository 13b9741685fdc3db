//! Refresh mask: which categories to reload rather than inherit.

use bitflags::bitflags;

use super::Category;

bitflags! {
    /// One bit per asset category.
    ///
    /// `Refresh::empty()` reuses everything from the previous snapshot;
    /// `Refresh::all()` reloads everything and is what a build without a
    /// previous snapshot uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Refresh: u32 {
        /// Org environment.
        const ENVIRONMENT = 1 << 0;
        /// Channels.
        const CHANNELS = 1 << 1;
        /// Contact fields.
        const FIELDS = 1 << 2;
        /// Contact groups.
        const GROUPS = 1 << 3;
        /// Classifiers.
        const CLASSIFIERS = 1 << 4;
        /// Campaigns and their events.
        const CAMPAIGNS = 1 << 5;
        /// Labels.
        const LABELS = 1 << 6;
        /// Ticketers.
        const TICKETERS = 1 << 7;
        /// Topics.
        const TOPICS = 1 << 8;
        /// Resthooks.
        const RESTHOOKS = 1 << 9;
        /// Templates.
        const TEMPLATES = 1 << 10;
        /// Triggers.
        const TRIGGERS = 1 << 11;
        /// Globals.
        const GLOBALS = 1 << 12;
        /// Locations.
        const LOCATIONS = 1 << 13;
        /// Users.
        const USERS = 1 << 14;
        /// Drop the lazily cached flows.
        const FLOWS = 1 << 15;
    }
}

impl Default for Refresh {
    fn default() -> Self {
        Self::empty()
    }
}

impl Refresh {
    /// Bit for a category.
    pub const fn of(category: Category) -> Self {
        match category {
            Category::Environment => Self::ENVIRONMENT,
            Category::Channels => Self::CHANNELS,
            Category::Fields => Self::FIELDS,
            Category::Groups => Self::GROUPS,
            Category::Classifiers => Self::CLASSIFIERS,
            Category::Campaigns => Self::CAMPAIGNS,
            Category::Labels => Self::LABELS,
            Category::Ticketers => Self::TICKETERS,
            Category::Topics => Self::TOPICS,
            Category::Resthooks => Self::RESTHOOKS,
            Category::Templates => Self::TEMPLATES,
            Category::Triggers => Self::TRIGGERS,
            Category::Globals => Self::GLOBALS,
            Category::Locations => Self::LOCATIONS,
            Category::Users => Self::USERS,
            Category::Flows => Self::FLOWS,
        }
    }

    /// Whether `category` must be reloaded.
    pub fn reloads(self, category: Category) -> bool {
        self.contains(Self::of(category))
    }
}
