//! Typed asset records, one struct per category.
//!
//! These are plain data. Loaders produce them, [`AssetSet`](super::AssetSet)
//! indexes them, and nothing mutates them afterwards. Campaigns live in
//! [`crate::campaigns::event`] because their events carry scheduling logic.

use chrono_tz::Tz;
use uuid::Uuid;

use super::Asset;
use crate::campaigns::event::Campaign;
use crate::ids::*;
use crate::schedule::Schedule;

// ----------------------- environment -----------------------

/// How the org wants contact URNs shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionPolicy {
    /// Show URNs.
    #[default]
    None,
    /// Hide URNs (anonymous orgs).
    Urns,
}

/// Date ordering used when parsing and formatting dates for this org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// 31-12-2024
    #[default]
    DayMonthYear,
    /// 12-31-2024
    MonthDayYear,
    /// 2024-12-31
    YearMonthDay,
}

/// Org-wide environment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Org timezone; all campaign arithmetic happens here.
    pub timezone: Tz,
    /// Default language (ISO-639-3), if configured.
    pub default_language: Option<String>,
    /// Every language the org translates into.
    pub allowed_languages: Vec<String>,
    /// Default country (ISO-3166 alpha-2), used for phone number parsing.
    pub default_country: Option<String>,
    /// Date ordering.
    pub date_format: DateFormat,
    /// URN redaction.
    pub redaction_policy: RedactionPolicy,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            default_language: None,
            allowed_languages: Vec::new(),
            default_country: None,
            date_format: DateFormat::default(),
            redaction_policy: RedactionPolicy::default(),
        }
    }
}

// ----------------------- channels -----------------------

/// A messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Channel id.
    pub id: ChannelId,
    /// Channel UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Sending address (number, handle...).
    pub address: String,
    /// URN schemes the channel can send to ("tel", "whatsapp"...).
    pub schemes: Vec<String>,
    /// Country the channel operates in.
    pub country: Option<String>,
    /// Whether this is an ad-hoc channel supplied for a simulation.
    pub is_test: bool,
}

impl Asset for Channel {
    type Id = ChannelId;
    fn id(&self) -> ChannelId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
    fn key(&self) -> Option<&str> {
        Some(&self.address)
    }
}

// ----------------------- fields -----------------------

/// Value type of a contact field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    Text,
    /// Number.
    Number,
    /// Date and time.
    Datetime,
    /// State-level location.
    State,
    /// District-level location.
    District,
    /// Ward-level location.
    Ward,
}

/// Whether a field was created by a user or is built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// User-defined field.
    User,
    /// Built-in field (e.g. `created_on`, `last_seen_on`).
    System,
}

/// A contact field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field id.
    pub id: FieldId,
    /// Field UUID.
    pub uuid: Uuid,
    /// Snake-case key, unique across user and system fields.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Value type.
    pub value_type: FieldType,
    /// User or system.
    pub scope: FieldScope,
}

impl Asset for Field {
    type Id = FieldId;
    fn id(&self) -> FieldId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }
}

// ----------------------- groups -----------------------

/// A contact group; smart groups carry a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group id.
    pub id: GroupId,
    /// Group UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Membership query for smart groups.
    pub query: Option<String>,
}

impl Asset for Group {
    type Id = GroupId;
    fn id(&self) -> GroupId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

// ----------------------- classifiers -----------------------

/// An NLU classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    /// Classifier id.
    pub id: ClassifierId,
    /// Classifier UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Backend type ("wit", "luis"...).
    pub kind: String,
    /// Intents the classifier knows.
    pub intents: Vec<String>,
}

impl Asset for Classifier {
    type Id = ClassifierId;
    fn id(&self) -> ClassifierId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

// ----------------------- labels, ticketers, topics -----------------------

/// A message label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Label id.
    pub id: LabelId,
    /// Label UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
}

impl Asset for Label {
    type Id = LabelId;
    fn id(&self) -> LabelId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

/// A ticketing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticketer {
    /// Ticketer id.
    pub id: TicketerId,
    /// Ticketer UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Backend type ("internal", "zendesk"...).
    pub kind: String,
}

impl Asset for Ticketer {
    type Id = TicketerId;
    fn id(&self) -> TicketerId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

/// A ticket topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Topic id.
    pub id: TopicId,
    /// Topic UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
}

impl Asset for Topic {
    type Id = TopicId;
    fn id(&self) -> TopicId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

// ----------------------- resthooks -----------------------

/// A resthook and the URLs subscribed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resthook {
    /// Resthook id.
    pub id: ResthookId,
    /// Slug used by flows to address the hook.
    pub slug: String,
    /// Subscriber target URLs.
    pub subscribers: Vec<String>,
}

impl Asset for Resthook {
    type Id = ResthookId;
    fn id(&self) -> ResthookId {
        self.id
    }
    fn key(&self) -> Option<&str> {
        Some(&self.slug)
    }
}

// ----------------------- templates -----------------------

/// Channel- and locale-specific template content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTranslation {
    /// Channel the translation was approved on.
    pub channel_uuid: Uuid,
    /// Locale, e.g. "eng-US".
    pub locale: String,
    /// Body with `{{n}}` placeholders.
    pub content: String,
    /// Number of placeholders.
    pub variable_count: u32,
}

/// A pre-approved message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Template id.
    pub id: TemplateId,
    /// Template UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Approved translations.
    pub translations: Vec<TemplateTranslation>,
}

impl Asset for Template {
    type Id = TemplateId;
    fn id(&self) -> TemplateId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}

// ----------------------- triggers -----------------------

/// What starts a trigger's flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// Incoming message matching a keyword.
    Keyword(Vec<String>),
    /// Incoming message that matched nothing else.
    CatchAll,
    /// Conversation started on a channel.
    NewConversation,
    /// Missed call.
    MissedCall,
    /// Repeating schedule.
    Scheduled(Schedule),
}

/// A trigger that starts a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Trigger id.
    pub id: TriggerId,
    /// What fires it.
    pub kind: TriggerKind,
    /// Flow to start.
    pub flow_id: FlowId,
    /// Restrict to this channel.
    pub channel_id: Option<ChannelId>,
    /// Only contacts in these groups.
    pub include_groups: Vec<GroupId>,
    /// Never contacts in these groups.
    pub exclude_groups: Vec<GroupId>,
}

impl Asset for Trigger {
    type Id = TriggerId;
    fn id(&self) -> TriggerId {
        self.id
    }
}

// ----------------------- globals -----------------------

/// An org-wide constant usable in flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    /// Global id.
    pub id: GlobalId,
    /// Key referenced in expressions.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Value.
    pub value: String,
}

impl Asset for Global {
    type Id = GlobalId;
    fn id(&self) -> GlobalId {
        self.id
    }
    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }
}

// ----------------------- locations -----------------------

/// An administrative boundary (country, state, district, ward).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Location id.
    pub id: LocationId,
    /// OSM id, used as the stable key.
    pub osm_id: String,
    /// Display name.
    pub name: String,
    /// 0 = country, 1 = state, 2 = district, 3 = ward.
    pub level: u8,
    /// Parent boundary.
    pub parent_id: Option<LocationId>,
    /// Alternative names.
    pub aliases: Vec<String>,
}

impl Asset for Location {
    type Id = LocationId;
    fn id(&self) -> LocationId {
        self.id
    }
    fn key(&self) -> Option<&str> {
        Some(&self.osm_id)
    }
}

// ----------------------- users -----------------------

/// A workspace user (for ticket assignment and audit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role code ("A" admin, "E" editor...).
    pub role: String,
}

impl Asset for User {
    type Id = UserId;
    fn id(&self) -> UserId {
        self.id
    }
    fn key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

// ----------------------- campaigns -----------------------

impl Asset for Campaign {
    type Id = CampaignId;
    fn id(&self) -> CampaignId {
        self.id
    }
    fn uuid(&self) -> Option<Uuid> {
        Some(self.uuid)
    }
}
