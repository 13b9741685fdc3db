//! Integer identifiers for the rows the cache and the scheduler deal with.
//!
//! Every id is a transparent newtype over the SQLite `INTEGER PRIMARY KEY`
//! value so an event id can never be passed where a contact id is expected.

use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(v: i32) -> Self {
                Self(v)
            }
        }
    };
}

id_type!(
    /// Tenant (organization) id. Every other entity is scoped by one.
    OrgId
);
id_type!(
    /// Messaging channel id.
    ChannelId
);
id_type!(
    /// Contact field id.
    FieldId
);
id_type!(
    /// Contact group id.
    GroupId
);
id_type!(
    /// NLU classifier id.
    ClassifierId
);
id_type!(
    /// Campaign id.
    CampaignId
);
id_type!(
    /// Campaign event id.
    EventId
);
id_type!(
    /// Message label id.
    LabelId
);
id_type!(
    /// Ticketing service id.
    TicketerId
);
id_type!(
    /// Ticket topic id.
    TopicId
);
id_type!(
    /// Resthook id.
    ResthookId
);
id_type!(
    /// Message template id.
    TemplateId
);
id_type!(
    /// Trigger id.
    TriggerId
);
id_type!(
    /// Global variable id.
    GlobalId
);
id_type!(
    /// Administrative boundary id.
    LocationId
);
id_type!(
    /// Workspace user id.
    UserId
);
id_type!(
    /// Flow id.
    FlowId
);
id_type!(
    /// Contact id.
    ContactId
);
id_type!(
    /// Event fire row id.
    FireId
);
