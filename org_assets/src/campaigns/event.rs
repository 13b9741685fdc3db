//! Campaigns, campaign events and fire-time computation.
//!
//! A [`Campaign`] owns its events; each [`CampaignEvent`] points back at its
//! campaign through a `Weak` so the pair forms no reference cycle. Campaigns
//! are built with [`Campaign::new`], which wires the back-references.
//!
//! Fire-time rules ([`CampaignEvent::schedule_for_time`]):
//! 1. Convert the start instant to the org timezone.
//! 2. Round up to the next whole minute if it has seconds or sub-seconds.
//! 3. Minutes/hours add elapsed time. Days/weeks add calendar days to the
//!    wall-clock time, so a DST transition in between does not shift the
//!    hour.
//! 4. With a delivery hour, move to that hour (minute zero) on the computed
//!    day.
//! 5. A result at or before `now` means no fire.
//!
//! Wall-clock results that fall in a DST gap or overlap are resolved with
//! [`localize`].

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Weak},
};

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use super::{CampaignError, contact::Contact};
use crate::{
    ids::{CampaignId, EventId, FlowId, GroupId},
    tz::localize,
};

/// Unit of an event's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetUnit {
    /// "M"
    Minutes,
    /// "H"
    Hours,
    /// "D"
    Days,
    /// "W"
    Weeks,
}

impl FromStr for OffsetUnit {
    type Err = CampaignError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "M" => Ok(Self::Minutes),
            "H" => Ok(Self::Hours),
            "D" => Ok(Self::Days),
            "W" => Ok(Self::Weeks),
            other => Err(CampaignError::UnknownOffsetUnit(other.to_string())),
        }
    }
}

impl fmt::Display for OffsetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        })
    }
}

/// What happens to a contact's current flow when the event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartMode {
    /// "I": interrupt whatever the contact is in.
    Interrupt,
    /// "S": skip contacts who are already in a flow.
    Skip,
    /// "P": start without interrupting.
    Passive,
}

impl FromStr for StartMode {
    type Err = CampaignError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "I" => Ok(Self::Interrupt),
            "S" => Ok(Self::Skip),
            "P" => Ok(Self::Passive),
            other => Err(CampaignError::UnknownStartMode(other.to_string())),
        }
    }
}

/// The contact attribute an event's offset is measured from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelativeTo {
    /// Contact creation time.
    CreatedOn,
    /// Contact's last inbound activity.
    LastSeenOn,
    /// A date field, by key.
    Field(String),
}

impl RelativeTo {
    /// Key used for the pseudo-field or field.
    pub fn key(&self) -> &str {
        match self {
            Self::CreatedOn => "created_on",
            Self::LastSeenOn => "last_seen_on",
            Self::Field(key) => key,
        }
    }

    /// Inverse of [`RelativeTo::key`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "created_on" => Self::CreatedOn,
            "last_seen_on" => Self::LastSeenOn,
            other => Self::Field(other.to_string()),
        }
    }
}

/// Definition of one event, before it is attached to a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    /// Event id.
    pub id: EventId,
    /// Event UUID.
    pub uuid: Uuid,
    /// Signed offset amount.
    pub offset: i32,
    /// Offset unit.
    pub unit: OffsetUnit,
    /// Hour of day (org time) to deliver at, if fixed.
    pub delivery_hour: Option<u32>,
    /// Reference attribute.
    pub relative_to: RelativeTo,
    /// Start mode.
    pub start_mode: StartMode,
    /// Flow started when the event fires.
    pub flow_id: FlowId,
}

/// A campaign event attached to its campaign.
#[derive(Debug)]
pub struct CampaignEvent {
    /// Event id.
    pub id: EventId,
    /// Event UUID.
    pub uuid: Uuid,
    /// Signed offset amount.
    pub offset: i32,
    /// Offset unit.
    pub unit: OffsetUnit,
    /// Hour of day (org time) to deliver at, if fixed.
    pub delivery_hour: Option<u32>,
    /// Reference attribute.
    pub relative_to: RelativeTo,
    /// Start mode.
    pub start_mode: StartMode,
    /// Flow started when the event fires.
    pub flow_id: FlowId,
    campaign: Weak<Campaign>,
}

/// A group-scoped set of events.
#[derive(Debug)]
pub struct Campaign {
    /// Campaign id.
    pub id: CampaignId,
    /// Campaign UUID.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Group whose members the campaign applies to.
    pub group_id: GroupId,
    events: Vec<Arc<CampaignEvent>>,
}

impl Campaign {
    /// Build a campaign and attach `events` to it.
    pub fn new(
        id: CampaignId,
        uuid: Uuid,
        name: impl Into<String>,
        group_id: GroupId,
        events: Vec<EventSpec>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            id,
            uuid,
            name,
            group_id,
            events: events
                .into_iter()
                .map(|spec| Arc::new(CampaignEvent::attach(spec, me.clone())))
                .collect(),
        })
    }

    /// Events in definition order.
    pub fn events(&self) -> &[Arc<CampaignEvent>] {
        &self.events
    }

    /// Event by id.
    pub fn event(&self, id: EventId) -> Option<&Arc<CampaignEvent>> {
        self.events.iter().find(|e| e.id == id)
    }
}

impl CampaignEvent {
    fn attach(spec: EventSpec, campaign: Weak<Campaign>) -> Self {
        Self {
            id: spec.id,
            uuid: spec.uuid,
            offset: spec.offset,
            unit: spec.unit,
            delivery_hour: spec.delivery_hour,
            relative_to: spec.relative_to,
            start_mode: spec.start_mode,
            flow_id: spec.flow_id,
            campaign,
        }
    }

    /// Owning campaign, while it is alive.
    pub fn campaign(&self) -> Option<Arc<Campaign>> {
        self.campaign.upgrade()
    }

    /// Fire time for `contact`, or `None` if the contact should not get one.
    ///
    /// The contact must be in the campaign's group and have a value for the
    /// attribute the event is relative to.
    pub fn schedule_for_contact(
        &self,
        tz: Tz,
        now: DateTime<Utc>,
        contact: &Contact,
    ) -> Result<Option<DateTime<Utc>>, CampaignError> {
        let Some(campaign) = self.campaign() else {
            return Ok(None);
        };
        if !contact.in_group(campaign.group_id) {
            return Ok(None);
        }
        match contact.reference_time(&self.relative_to) {
            Some(start) => self.schedule_for_time(tz, now, start),
            None => Ok(None),
        }
    }

    /// Fire time for an event counted from `start`, or `None` if that time is
    /// not after `now`.
    pub fn schedule_for_time(
        &self,
        tz: Tz,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CampaignError> {
        let mut local = start.with_timezone(&tz);
        if local.second() != 0 || local.nanosecond() != 0 {
            let excess = Duration::seconds(i64::from(local.second()))
                + Duration::nanoseconds(i64::from(local.nanosecond()));
            local = local - excess + Duration::minutes(1);
        }

        let out_of_range = || CampaignError::OutOfRange {
            offset: self.offset,
            unit: self.unit,
        };
        let offset = i64::from(self.offset);
        let mut scheduled = match self.unit {
            OffsetUnit::Minutes => local
                .checked_add_signed(Duration::minutes(offset))
                .ok_or_else(out_of_range)?,
            OffsetUnit::Hours => local
                .checked_add_signed(Duration::hours(offset))
                .ok_or_else(out_of_range)?,
            OffsetUnit::Days | OffsetUnit::Weeks => {
                let days = if self.unit == OffsetUnit::Weeks { offset * 7 } else { offset };
                let wall = local
                    .naive_local()
                    .checked_add_signed(Duration::days(days))
                    .ok_or_else(out_of_range)?;
                resolve(wall, tz)?
            }
        };

        if let Some(hour) = self.delivery_hour {
            let wall = scheduled
                .date_naive()
                .and_hms_opt(hour, 0, 0)
                .ok_or(CampaignError::InvalidDeliveryHour(hour))?;
            scheduled = resolve(wall, tz)?;
        }

        let scheduled = scheduled.with_timezone(&Utc);
        Ok((scheduled > now).then_some(scheduled))
    }
}

fn resolve(wall: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, CampaignError> {
    localize(wall, tz).map_err(|_| CampaignError::UnresolvableLocalTime {
        local: wall,
        tz: tz.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ContactId;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::{BTreeSet, HashMap};

    fn spec(
        offset: i32,
        unit: OffsetUnit,
        delivery_hour: Option<u32>,
        relative_to: RelativeTo,
    ) -> EventSpec {
        EventSpec {
            id: EventId(1),
            uuid: Uuid::new_v4(),
            offset,
            unit,
            delivery_hour,
            relative_to,
            start_mode: StartMode::Interrupt,
            flow_id: FlowId(1),
        }
    }

    fn event(offset: i32, unit: OffsetUnit, delivery_hour: Option<u32>) -> Arc<Campaign> {
        Campaign::new(
            CampaignId(1),
            Uuid::new_v4(),
            "Reminders",
            GroupId(7),
            vec![spec(offset, unit, delivery_hour, RelativeTo::CreatedOn)],
        )
    }

    fn local(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap();
        tz.from_local_datetime(&naive).unwrap().with_timezone(&Utc)
    }

    fn long_ago() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn back_reference_reaches_the_campaign() {
        let campaign = event(1, OffsetUnit::Days, None);
        let ev = &campaign.events()[0];
        assert_eq!(ev.campaign().unwrap().id, CampaignId(1));
        assert!(campaign.event(EventId(1)).is_some());
    }

    #[test]
    fn two_weeks_at_nine() {
        let tz = Tz::Africa__Kigali;
        let campaign = event(2, OffsetUnit::Weeks, Some(9));
        let start = local(tz, 2024, 1, 1, 8, 15);
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), start)
            .unwrap();
        assert_eq!(got, Some(local(tz, 2024, 1, 15, 9, 0)));
    }

    #[test]
    fn day_offset_keeps_wall_clock_across_spring_forward() {
        let tz = Tz::America__New_York;
        let campaign = event(1, OffsetUnit::Days, None);
        // 2024-03-10 is the spring-forward day in New York
        let start = local(tz, 2024, 3, 9, 9, 0);
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), start)
            .unwrap()
            .unwrap();
        assert_eq!(got, local(tz, 2024, 3, 10, 9, 0));
        assert_eq!(got - start, Duration::hours(23));
    }

    #[test]
    fn hour_offset_is_elapsed_time_across_fall_back() {
        let tz = Tz::America__New_York;
        let campaign = event(24, OffsetUnit::Hours, None);
        let start = local(tz, 2024, 11, 2, 9, 0);
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), start)
            .unwrap()
            .unwrap();
        assert_eq!(got - start, Duration::hours(24));
        assert_eq!(got, local(tz, 2024, 11, 3, 8, 0));
    }

    #[test]
    fn seconds_round_up_never_down() {
        let tz = Tz::UTC;
        let campaign = event(5, OffsetUnit::Minutes, None);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 1).unwrap();
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), start)
            .unwrap();
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 6, 0).unwrap()));

        let on_minute = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), on_minute)
            .unwrap();
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap()));
    }

    #[test]
    fn negative_offsets_count_backwards() {
        let tz = Tz::UTC;
        let campaign = event(-3, OffsetUnit::Days, Some(12));
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let got = campaign.events()[0]
            .schedule_for_time(tz, long_ago(), start)
            .unwrap();
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap()));
    }

    #[test]
    fn past_result_is_no_fire() {
        let tz = Tz::UTC;
        let campaign = event(1, OffsetUnit::Hours, None);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        // exactly now is not after now
        assert_eq!(campaign.events()[0].schedule_for_time(tz, now, start), Ok(None));
        let later = now + Duration::days(1);
        assert_eq!(campaign.events()[0].schedule_for_time(tz, later, start), Ok(None));
    }

    #[test]
    fn bad_delivery_hour_is_a_configuration_error() {
        let campaign = event(1, OffsetUnit::Days, Some(24));
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(
            campaign.events()[0].schedule_for_time(Tz::UTC, long_ago(), start),
            Err(CampaignError::InvalidDeliveryHour(24))
        );
    }

    #[test]
    fn unit_and_mode_codes() {
        assert_eq!("W".parse::<OffsetUnit>(), Ok(OffsetUnit::Weeks));
        assert_eq!(
            "Y".parse::<OffsetUnit>(),
            Err(CampaignError::UnknownOffsetUnit("Y".into()))
        );
        assert_eq!("P".parse::<StartMode>(), Ok(StartMode::Passive));
        assert!("X".parse::<StartMode>().is_err());
        assert_eq!(RelativeTo::from_key("last_seen_on"), RelativeTo::LastSeenOn);
        assert_eq!(RelativeTo::from_key("dob").key(), "dob");
    }

    fn contact(groups: &[i32], last_seen_on: Option<DateTime<Utc>>) -> Contact {
        Contact {
            id: ContactId(100),
            uuid: Uuid::new_v4(),
            created_on: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            last_seen_on,
            groups: groups.iter().copied().map(GroupId).collect::<BTreeSet<_>>(),
            fields: HashMap::new(),
        }
    }

    #[test]
    fn contact_gates() {
        let campaign = Campaign::new(
            CampaignId(1),
            Uuid::new_v4(),
            "Follow up",
            GroupId(7),
            vec![spec(1, OffsetUnit::Days, None, RelativeTo::LastSeenOn)],
        );
        let ev = &campaign.events()[0];
        let seen = Some(Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap());

        // not in the group
        assert_eq!(ev.schedule_for_contact(Tz::UTC, long_ago(), &contact(&[1], seen)), Ok(None));
        // in the group but never seen
        assert_eq!(ev.schedule_for_contact(Tz::UTC, long_ago(), &contact(&[7], None)), Ok(None));
        // both gates pass
        assert_eq!(
            ev.schedule_for_contact(Tz::UTC, long_ago(), &contact(&[7], seen)),
            Ok(Some(Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap()))
        );
    }
}
