// libs/appointment-cell/src/services/calendar.rs
use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{AppointmentError, GridMode, TimeWindow};

const WORK_WEEK_DAYS: u64 = 5;

/// Calendar years accepted from clients. Grid arithmetic stays far from chrono's limits.
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

fn out_of_range(date: NaiveDate) -> AppointmentError {
    AppointmentError::ValidationError(format!("Date {} is outside the supported calendar", date))
}

/// Slot keys are whole seconds in every store.
pub fn require_whole_seconds(instant: DateTime<Utc>) -> Result<DateTime<Utc>, AppointmentError> {
    if instant.nanosecond() == 0 {
        Ok(instant)
    } else {
        Err(AppointmentError::ValidationError(format!(
            "Slot time {} must not carry fractional seconds",
            instant
        )))
    }
}

/// Clinic-wide calendar settings: one civil timezone and the hourly start times.
#[derive(Debug, Clone)]
pub struct ClinicSchedule {
    timezone: Tz,
    business_hours: Vec<NaiveTime>,
}

impl ClinicSchedule {
    pub fn new(timezone: Tz, opening_hour: u32, last_slot_hour: u32) -> Result<Self, AppointmentError> {
        if last_slot_hour > 23 || opening_hour > last_slot_hour {
            return Err(AppointmentError::ValidationError(format!(
                "Invalid business hours {}..={}",
                opening_hour, last_slot_hour
            )));
        }

        let business_hours = (opening_hour..=last_slot_hour)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .collect();

        Ok(Self { timezone, business_hours })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppointmentError> {
        let timezone: Tz = config.clinic_timezone.parse().map_err(|_| {
            AppointmentError::ValidationError(format!("Unknown clinic timezone '{}'", config.clinic_timezone))
        })?;
        Self::new(timezone, config.opening_hour, config.last_slot_hour)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn business_hours(&self) -> &[NaiveTime] {
        &self.business_hours
    }

    /// Civil date/time in the clinic to an absolute instant.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant; times inside a
    /// spring-forward gap do not exist and yield `None`.
    pub fn localize(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        match self.timezone.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }

    /// First instant of a civil day. Chilean DST switches at midnight, so 00:00 may not exist.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        (0..24)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .find_map(|time| self.localize(date, time))
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc())
    }

    /// `[start of first day, start of the day after last)` in clinic civil time.
    pub fn days_window(&self, first: NaiveDate, last: NaiveDate) -> TimeWindow {
        let after_last = last.succ_opt().unwrap_or(last);
        TimeWindow::new(self.start_of_day(first), self.start_of_day(after_last))
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.timezone).time()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_date(now)
    }

    /// Parse a client-supplied instant. Offset-less input is clinic civil time.
    pub fn parse_instant(&self, raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
        let raw = raw.trim();
        let instant = match DateTime::parse_from_rfc3339(raw) {
            Ok(with_offset) => with_offset.with_timezone(&Utc),
            Err(_) => {
                let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                    .ok_or_else(|| AppointmentError::ValidationError(format!("Unparsable timestamp '{}'", raw)))?;
                if !SUPPORTED_YEARS.contains(&naive.year()) {
                    return Err(out_of_range(naive.date()));
                }

                self.localize(naive.date(), naive.time()).ok_or_else(|| {
                    AppointmentError::ValidationError(format!("'{}' does not exist in the clinic timezone", raw))
                })?
            }
        };

        if !SUPPORTED_YEARS.contains(&instant.year()) {
            return Err(out_of_range(instant.date_naive()));
        }
        require_whole_seconds(instant)
    }

    /// `YYYY-MM-DD`, falling back to today when absent or malformed.
    pub fn parse_date_or_today(&self, raw: Option<&str>, now: DateTime<Utc>) -> NaiveDate {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .filter(|date| SUPPORTED_YEARS.contains(&date.year()))
                .unwrap_or_else(|| {
                    warn!("Ignoring malformed or out-of-range date '{}', using today", value);
                    self.today(now)
                }),
            None => self.today(now),
        }
    }

    pub fn grid(&self, anchor: NaiveDate, mode: GridMode) -> Result<CalendarGrid<'_>, AppointmentError> {
        CalendarGrid::new(self, anchor, mode)
    }
}

/// `date` shifted by whole days, or a validation error at the edge of the calendar.
pub fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate, AppointmentError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| out_of_range(date))
}

/// Monday of the anchor's week.
pub fn start_of_week(anchor: NaiveDate) -> Result<NaiveDate, AppointmentError> {
    shift_days(anchor, -i64::from(anchor.weekday().num_days_from_monday()))
}

/// `(start_of_week, previous_week, next_week)` for calendar navigation.
pub fn week_navigation(anchor: NaiveDate) -> Result<(NaiveDate, NaiveDate, NaiveDate), AppointmentError> {
    let start = start_of_week(anchor)?;
    Ok((start, shift_days(start, -7)?, shift_days(start, 7)?))
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    pub date: NaiveDate,
    pub local_time: NaiveTime,
    pub instant: DateTime<Utc>,
}

/// Candidate slots for a day or a Monday-to-Friday week. Iterating is lazy and repeatable.
#[derive(Debug, Clone)]
pub struct CalendarGrid<'a> {
    schedule: &'a ClinicSchedule,
    days: Vec<NaiveDate>,
}

impl<'a> CalendarGrid<'a> {
    pub fn new(schedule: &'a ClinicSchedule, anchor: NaiveDate, mode: GridMode) -> Result<Self, AppointmentError> {
        let days: Vec<NaiveDate> = match mode {
            GridMode::Day => vec![anchor],
            GridMode::WorkWeek => {
                let monday = start_of_week(anchor)?;
                (0..WORK_WEEK_DAYS)
                    .map(|offset| monday.checked_add_days(Days::new(offset)).ok_or_else(|| out_of_range(monday)))
                    .collect::<Result<_, _>>()?
            }
        };
        let days = days.into_iter().filter(|day| is_business_day(*day)).collect();

        Ok(Self { schedule, days })
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = GridSlot> + '_ {
        self.days.iter().flat_map(move |day| self.slots_on(*day))
    }

    pub fn slots_on(&self, day: NaiveDate) -> impl Iterator<Item = GridSlot> + '_ {
        self.schedule.business_hours.iter().filter_map(move |time| {
            let instant = self.schedule.localize(day, *time);
            if instant.is_none() {
                debug!("Skipping nonexistent local slot {} {}", day, time);
            }
            instant.map(|instant| GridSlot { date: day, local_time: *time, instant })
        })
    }

    /// Bounded query window covering every slot, `[first, last + 1s)`.
    pub fn window(&self) -> Option<TimeWindow> {
        let first = self.iter().map(|slot| slot.instant).min()?;
        let last = self.iter().map(|slot| slot.instant).max()?;
        Some(TimeWindow::new(first, last.checked_add_signed(Duration::seconds(1))?))
    }
}
