//! Repeating schedules for scheduled triggers.
//!
//! A [`Schedule`] fires at a wall-clock `hour:minute` in the org's time zone,
//! repeating daily, on selected days of the week, or on one day of the month.
//! Days of the week are written as a string over `MTWRFSU` (Monday first, `R`
//! is Thursday, `U` is Sunday). A day of the month past the end of a short
//! month fires on the month's last day instead, so `31` fires on 30 April.
//!
//! Wall times that do not exist or occur twice around DST transitions are
//! resolved with [`localize`]: the first occurrence, or the first valid minute
//! after a gap.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::tz::localize;

const WEEKDAY_CODES: &str = "MTWRFSU";
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// How often a schedule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatPeriod {
    /// Fires once and is never rescheduled ("O").
    Never,
    /// Every day ("D").
    Daily,
    /// On the listed days of the week ("W").
    Weekly,
    /// On one day of the month ("M").
    Monthly,
}

impl RepeatPeriod {
    /// Storage code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Never => "O",
            Self::Daily => "D",
            Self::Weekly => "W",
            Self::Monthly => "M",
        }
    }
}

impl fmt::Display for RepeatPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RepeatPeriod {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O" => Ok(Self::Never),
            "D" => Ok(Self::Daily),
            "W" => Ok(Self::Weekly),
            "M" => Ok(Self::Monthly),
            other => Err(ScheduleError::UnknownRepeatPeriod(other.to_string())),
        }
    }
}

/// Misconfigured schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Repeating schedule without a time of day.
    #[error("repeating schedule needs both hour and minute")]
    MissingHourOrMinute,
    /// Weekly schedule with no days selected.
    #[error("weekly schedule needs at least one day of the week")]
    WeeklyWithoutDays,
    /// Monthly schedule with no day of the month.
    #[error("monthly schedule needs a day of the month")]
    MonthlyWithoutDay,
    /// Repeat code not in `O`, `D`, `W`, `M`.
    #[error("unknown repeat period {0:?}")]
    UnknownRepeatPeriod(String),
    /// Day-of-week letter outside `MTWRFSU`.
    #[error("invalid day of week {0:?}")]
    InvalidDayOfWeek(char),
    /// Hour or minute out of range.
    #[error("invalid time of day {hour}:{minute}")]
    InvalidTime {
        /// Configured hour.
        hour: u32,
        /// Configured minute.
        minute: u32,
    },
    /// Day of the month outside 1..=31.
    #[error("invalid day of month {0}")]
    InvalidDayOfMonth(u32),
    /// No instant could be found for the next wall-clock occurrence.
    #[error("cannot resolve {0} in {1}")]
    Unresolvable(NaiveDateTime, String),
}

/// A repeating wall-clock schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Repeat period.
    pub repeat_period: RepeatPeriod,
    /// Hour of day, 0-23.
    pub hour_of_day: Option<u32>,
    /// Minute of hour, 0-59.
    pub minute_of_hour: Option<u32>,
    /// Day of month for monthly schedules, 1-31.
    pub day_of_month: Option<u32>,
    /// Day letters for weekly schedules, e.g. `"MWF"`.
    pub days_of_week: Option<String>,
}

impl Schedule {
    /// Daily schedule at `hour:minute`.
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            repeat_period: RepeatPeriod::Daily,
            hour_of_day: Some(hour),
            minute_of_hour: Some(minute),
            day_of_month: None,
            days_of_week: None,
        }
    }

    /// Weekly schedule on `days` at `hour:minute`.
    pub fn weekly(days: &str, hour: u32, minute: u32) -> Self {
        Self {
            repeat_period: RepeatPeriod::Weekly,
            days_of_week: Some(days.to_string()),
            ..Self::daily(hour, minute)
        }
    }

    /// Monthly schedule on `day` at `hour:minute`.
    pub fn monthly(day: u32, hour: u32, minute: u32) -> Self {
        Self {
            repeat_period: RepeatPeriod::Monthly,
            day_of_month: Some(day),
            ..Self::daily(hour, minute)
        }
    }

    /// Parsed days of the week, in `MTWRFSU` order.
    pub fn weekdays(&self) -> Result<Vec<Weekday>, ScheduleError> {
        let raw = self.days_of_week.as_deref().unwrap_or_default();
        let mut days = Vec::new();
        for c in raw.chars() {
            let idx = WEEKDAY_CODES
                .find(c)
                .ok_or(ScheduleError::InvalidDayOfWeek(c))?;
            let day = WEEKDAYS[idx];
            if !days.contains(&day) {
                days.push(day);
            }
        }
        days.sort_by_key(|d| d.num_days_from_monday());
        Ok(days)
    }

    /// Check the fields the repeat period needs.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.repeat_period == RepeatPeriod::Never {
            return Ok(());
        }
        self.time_of_day()?;
        match self.repeat_period {
            RepeatPeriod::Weekly => {
                if self.weekdays()?.is_empty() {
                    return Err(ScheduleError::WeeklyWithoutDays);
                }
            }
            RepeatPeriod::Monthly => {
                let day = self.day_of_month.ok_or(ScheduleError::MonthlyWithoutDay)?;
                if !(1..=31).contains(&day) {
                    return Err(ScheduleError::InvalidDayOfMonth(day));
                }
            }
            RepeatPeriod::Never | RepeatPeriod::Daily => {}
        }
        Ok(())
    }

    /// Next occurrence strictly after `now`, or `None` for a one-off schedule.
    pub fn next_fire(
        &self,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        self.validate()?;
        let time = match self.repeat_period {
            RepeatPeriod::Never => return Ok(None),
            _ => self.time_of_day()?,
        };
        let today = now.with_timezone(&tz).date_naive();

        // Candidates are generated in date order, so the first one after
        // `now` is the answer. A monthly schedule always has a candidate
        // within two months because day 31 clamps.
        let candidates: Vec<NaiveDate> = match self.repeat_period {
            RepeatPeriod::Daily => (0..=1).map(|d| today + Duration::days(d)).collect(),
            RepeatPeriod::Weekly => {
                let days = self.weekdays()?;
                (0..=7)
                    .map(|d| today + Duration::days(d))
                    .filter(|date| days.contains(&date.weekday()))
                    .collect()
            }
            RepeatPeriod::Monthly => {
                let day = self.day_of_month.ok_or(ScheduleError::MonthlyWithoutDay)?;
                (0..=2)
                    .filter_map(|m| month_day(today, m, day))
                    .collect()
            }
            RepeatPeriod::Never => Vec::new(),
        };

        for date in candidates {
            let at = date.and_time(time);
            let fire = localize(at, tz)
                .map_err(|_| ScheduleError::Unresolvable(at, tz.name().to_string()))?
                .with_timezone(&Utc);
            if fire > now {
                return Ok(Some(fire));
            }
        }
        Ok(None)
    }

    fn time_of_day(&self) -> Result<NaiveTime, ScheduleError> {
        let (Some(hour), Some(minute)) = (self.hour_of_day, self.minute_of_hour) else {
            return Err(ScheduleError::MissingHourOrMinute);
        };
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ScheduleError::InvalidTime { hour, minute })
    }
}

/// `day` of the month `months_ahead` after `from`'s month, clamped to the
/// month's last day.
fn month_day(from: NaiveDate, months_ahead: u32, day: u32) -> Option<NaiveDate> {
    let index = from.year() * 12 + from.month0() as i32 + months_ahead as i32;
    let (year, month) = (index.div_euclid(12), index.rem_euclid(12) as u32 + 1);
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?.day();
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}
