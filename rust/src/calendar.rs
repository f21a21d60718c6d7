//! Working-time arithmetic.
//!
//! Each working day contributes one window `[day_start, day_start + hours_per_day]`.
//! Offsets are consumed only inside those windows; weekends, non-working
//! weekdays and holidays are skipped entirely. A zero offset is a no-op.
//! A window that would run past midnight starts earlier instead.

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::config::CalendarConfig;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Reasons a calendar cannot be used for date arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Invalid calendar: no working days configured")]
    NoWorkingDays,
    #[error("Invalid calendar: hours per day must be positive, got {0}")]
    NonPositiveHours(f64),
    #[error("Invalid calendar: hours per day cannot exceed 24, got {0}")]
    HoursExceedDay(f64),
    #[error("Invalid calendar: unknown weekday '{0}'")]
    UnknownWeekday(String),
    #[error("Invalid offset: {0} hours")]
    InvalidOffset(f64),
    #[error("Date out of range while walking the calendar from {0}")]
    OutOfRange(NaiveDateTime),
}

/// Parse an English (full or short) or Spanish weekday name.
pub fn parse_weekday(name: &str) -> Result<Weekday, CalendarError> {
    let weekday = match name.trim().to_lowercase().as_str() {
        "monday" | "mon" | "lunes" => Weekday::Mon,
        "tuesday" | "tue" | "tues" | "martes" => Weekday::Tue,
        "wednesday" | "wed" | "miercoles" | "miércoles" => Weekday::Wed,
        "thursday" | "thu" | "thurs" | "jueves" => Weekday::Thu,
        "friday" | "fri" | "viernes" => Weekday::Fri,
        "saturday" | "sat" | "sabado" | "sábado" => Weekday::Sat,
        "sunday" | "sun" | "domingo" => Weekday::Sun,
        _ => return Err(CalendarError::UnknownWeekday(name.to_string())),
    };
    Ok(weekday)
}

/// A validated working calendar.
///
/// Construction fails for calendars that could never make progress, so every
/// walk over a `WorkingCalendar` terminates.
#[derive(Clone, Debug)]
pub struct WorkingCalendar {
    /// Indexed by `Weekday::num_days_from_monday`.
    working_weekdays: [bool; 7],
    holidays: FxHashSet<NaiveDate>,
    day_start: NaiveTime,
    /// Working seconds in one working day.
    day_seconds: i64,
}

impl WorkingCalendar {
    pub fn new(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let hours = config.hours_per_day;
        if hours.is_nan() || hours <= 0.0 {
            return Err(CalendarError::NonPositiveHours(hours));
        }
        if hours > 24.0 {
            return Err(CalendarError::HoursExceedDay(hours));
        }

        let day_seconds = (hours * 3600.0).round() as i64;
        if day_seconds <= 0 {
            return Err(CalendarError::NonPositiveHours(hours));
        }
        let start_seconds = i64::from(config.day_start.num_seconds_from_midnight());
        let overflow = (start_seconds + day_seconds - SECONDS_PER_DAY).max(0);
        let day_start = config.day_start - Duration::seconds(overflow);

        let mut working_weekdays = [false; 7];
        for name in &config.working_days {
            let weekday = parse_weekday(name)?;
            working_weekdays[weekday.num_days_from_monday() as usize] = true;
        }
        if !working_weekdays.iter().any(|&w| w) {
            return Err(CalendarError::NoWorkingDays);
        }

        Ok(Self {
            working_weekdays,
            holidays: config.holidays.iter().copied().collect(),
            day_start,
            day_seconds,
        })
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_weekdays[date.weekday().num_days_from_monday() as usize]
            && !self.holidays.contains(&date)
    }

    /// Offset `from` by signed working minutes.
    pub fn add_duration(
        &self,
        from: NaiveDateTime,
        minutes: i64,
    ) -> Result<NaiveDateTime, CalendarError> {
        self.add_seconds(from, minutes.saturating_mul(60))
    }

    /// Offset `from` by signed working hours.
    pub fn add_work_hours(
        &self,
        from: NaiveDateTime,
        hours: f64,
    ) -> Result<NaiveDateTime, CalendarError> {
        if !hours.is_finite() {
            return Err(CalendarError::InvalidOffset(hours));
        }
        self.add_seconds(from, (hours * 3600.0).round() as i64)
    }

    /// The earliest instant at or after `at` that lies inside a working window.
    pub fn next_working_instant(&self, at: NaiveDateTime) -> Result<NaiveDateTime, CalendarError> {
        let day = at.date();
        if self.is_working_day(day) {
            let (window_start, window_end) = self.window(day)?;
            if at < window_start {
                return Ok(window_start);
            }
            if at < window_end {
                return Ok(at);
            }
        }
        let next = self.next_working_day(day)?;
        Ok(self.window(next)?.0)
    }

    /// Signed working minutes elapsed between `from` and `to`.
    pub fn working_minutes_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<i64, CalendarError> {
        if to < from {
            return Ok(-self.working_minutes_between(to, from)?);
        }
        let mut seconds = 0;
        let mut day = from.date();
        while day <= to.date() {
            if self.is_working_day(day) {
                let (window_start, window_end) = self.window(day)?;
                let begin = from.max(window_start);
                let end = to.min(window_end);
                if end > begin {
                    seconds += (end - begin).num_seconds();
                }
            }
            day = day
                .succ_opt()
                .ok_or(CalendarError::OutOfRange(day.and_time(self.day_start)))?;
        }
        Ok(seconds / 60)
    }

    /// Start of each working window, after any shift to fit the day.
    pub fn day_start(&self) -> NaiveTime {
        self.day_start
    }

    fn add_seconds(
        &self,
        from: NaiveDateTime,
        seconds: i64,
    ) -> Result<NaiveDateTime, CalendarError> {
        match seconds {
            0 => Ok(from),
            s if s > 0 => self.walk_forward(from, s),
            s => self.walk_backward(from, s.saturating_neg()),
        }
    }

    fn walk_forward(
        &self,
        from: NaiveDateTime,
        seconds: i64,
    ) -> Result<NaiveDateTime, CalendarError> {
        let mut remaining = seconds;
        let mut day = from.date();
        let mut cursor = from;
        loop {
            if self.is_working_day(day) {
                let (window_start, window_end) = self.window(day)?;
                let begin = cursor.max(window_start);
                if begin < window_end {
                    let available = (window_end - begin).num_seconds();
                    if remaining <= available {
                        return shift(begin, remaining);
                    }
                    remaining -= available;
                }
            }
            day = self.next_working_day(day)?;
            (day, remaining) = self.skip_weeks(day, remaining, true)?;
            cursor = self.window(day)?.0;
        }
    }

    fn walk_backward(
        &self,
        from: NaiveDateTime,
        seconds: i64,
    ) -> Result<NaiveDateTime, CalendarError> {
        let mut remaining = seconds;
        let mut day = from.date();
        let mut cursor = from;
        loop {
            if self.is_working_day(day) {
                let (window_start, window_end) = self.window(day)?;
                let end = cursor.min(window_end);
                if end > window_start {
                    let available = (end - window_start).num_seconds();
                    if remaining <= available {
                        return shift(end, -remaining);
                    }
                    remaining -= available;
                }
            }
            day = self.previous_working_day(day)?;
            (day, remaining) = self.skip_weeks(day, remaining, false)?;
            cursor = self.window(day)?.1;
        }
    }

    /// Jump over the whole weeks `remaining` is certain to consume, starting
    /// with the untouched `day` and moving forward or backward.
    ///
    /// Returns the next untouched day and the seconds still to consume, which
    /// stay positive. Holidays on working weekdays inside the skipped span are
    /// given back.
    fn skip_weeks(
        &self,
        day: NaiveDate,
        remaining: i64,
        forward: bool,
    ) -> Result<(NaiveDate, i64), CalendarError> {
        let working_weekdays = self.working_weekdays.iter().filter(|&&w| w).count() as i64;
        let week_seconds = working_weekdays * self.day_seconds;
        let weeks = (remaining - 1) / week_seconds;
        if weeks == 0 {
            return Ok((day, remaining));
        }

        let out_of_range = || CalendarError::OutOfRange(day.and_time(self.day_start));
        let span = weeks
            .checked_mul(7)
            .and_then(|d| u64::try_from(d).ok())
            .map(Days::new)
            .ok_or_else(out_of_range)?;
        let target = if forward {
            day.checked_add_days(span)
        } else {
            day.checked_sub_days(span)
        }
        .ok_or_else(out_of_range)?;

        let skipped_holidays = self
            .holidays
            .iter()
            .filter(|&&h| {
                let inside = if forward {
                    h >= day && h < target
                } else {
                    h > target && h <= day
                };
                inside && self.working_weekdays[h.weekday().num_days_from_monday() as usize]
            })
            .count() as i64;

        Ok((
            target,
            remaining - weeks * week_seconds + skipped_holidays * self.day_seconds,
        ))
    }

    fn window(&self, day: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), CalendarError> {
        let start = day.and_time(self.day_start);
        Ok((start, shift(start, self.day_seconds)?))
    }

    /// Upper bound on days scanned before a working day must appear: every
    /// holiday can mask at most one occurrence of a working weekday.
    fn search_limit(&self) -> usize {
        7 * (self.holidays.len() + 2)
    }

    fn next_working_day(&self, after: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut day = after;
        for _ in 0..self.search_limit() {
            day = day
                .succ_opt()
                .ok_or(CalendarError::OutOfRange(after.and_time(self.day_start)))?;
            if self.is_working_day(day) {
                return Ok(day);
            }
        }
        Err(CalendarError::NoWorkingDays)
    }

    fn previous_working_day(&self, before: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut day = before;
        for _ in 0..self.search_limit() {
            day = day
                .pred_opt()
                .ok_or(CalendarError::OutOfRange(before.and_time(self.day_start)))?;
            if self.is_working_day(day) {
                return Ok(day);
            }
        }
        Err(CalendarError::NoWorkingDays)
    }
}

fn shift(at: NaiveDateTime, seconds: i64) -> Result<NaiveDateTime, CalendarError> {
    at.checked_add_signed(Duration::seconds(seconds))
        .ok_or(CalendarError::OutOfRange(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        // January 2025: the 1st is a Wednesday, the 4th and 5th are a weekend.
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn default_calendar() -> WorkingCalendar {
        WorkingCalendar::new(&CalendarConfig::default()).unwrap()
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let cal = default_calendar();
        // Even outside working hours.
        let saturday_night = at(4, 23, 0);
        assert_eq!(cal.add_duration(saturday_night, 0).unwrap(), saturday_night);
        assert_eq!(cal.add_work_hours(at(1, 8, 0), 0.0).unwrap(), at(1, 8, 0));
    }

    #[test]
    fn test_offset_within_day() {
        let cal = default_calendar();
        assert_eq!(cal.add_duration(at(1, 8, 0), 120).unwrap(), at(1, 10, 0));
    }

    #[test]
    fn test_offset_wraps_to_next_working_day() {
        let cal = default_calendar();
        // 08:00-16:00 window; 3h from 15:00 leaves 2h for Thursday.
        assert_eq!(cal.add_work_hours(at(1, 15, 0), 3.0).unwrap(), at(2, 10, 0));
    }

    #[test]
    fn test_offset_filling_window_stays_on_same_day() {
        let cal = default_calendar();
        assert_eq!(cal.add_work_hours(at(1, 8, 0), 8.0).unwrap(), at(1, 16, 0));
    }

    #[test]
    fn test_offset_skips_weekend() {
        let cal = default_calendar();
        // Friday 15:00 + 2h -> Monday 09:00.
        assert_eq!(cal.add_duration(at(3, 15, 0), 120).unwrap(), at(6, 9, 0));
    }

    #[test]
    fn test_offset_from_non_working_time_starts_at_next_window() {
        let cal = default_calendar();
        assert_eq!(cal.add_duration(at(4, 12, 0), 30).unwrap(), at(6, 8, 30));
        assert_eq!(cal.add_duration(at(1, 6, 0), 30).unwrap(), at(1, 8, 30));
    }

    #[test]
    fn test_offset_skips_holiday() {
        let mut config = CalendarConfig::default();
        config
            .holidays
            .insert(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        let cal = WorkingCalendar::new(&config).unwrap();
        assert!(!cal.is_working_day(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()));
        assert_eq!(cal.add_work_hours(at(1, 15, 0), 2.0).unwrap(), at(3, 9, 0));
    }

    #[test]
    fn test_negative_offset_walks_backward() {
        let cal = default_calendar();
        assert_eq!(cal.add_duration(at(1, 10, 0), -60).unwrap(), at(1, 9, 0));
        // Monday 09:00 - 2h -> Friday 15:00.
        assert_eq!(cal.add_duration(at(6, 9, 0), -120).unwrap(), at(3, 15, 0));
        // From the evening, the walk starts at the window end.
        assert_eq!(cal.add_duration(at(2, 20, 0), -60).unwrap(), at(2, 15, 0));
    }

    #[test]
    fn test_full_day_window_backward_crosses_midnight() {
        let config = CalendarConfig {
            hours_per_day: 24.0,
            day_start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            ..CalendarConfig::default()
        };
        let cal = WorkingCalendar::new(&config).unwrap();
        assert_eq!(cal.add_duration(at(2, 0, 0), -60).unwrap(), at(1, 23, 0));
        assert_eq!(cal.add_duration(at(1, 23, 0), 120).unwrap(), at(2, 1, 0));
    }

    #[test]
    fn test_next_working_instant() {
        let cal = default_calendar();
        assert_eq!(cal.next_working_instant(at(1, 9, 0)).unwrap(), at(1, 9, 0));
        assert_eq!(cal.next_working_instant(at(1, 16, 0)).unwrap(), at(2, 8, 0));
        assert_eq!(cal.next_working_instant(at(5, 9, 0)).unwrap(), at(6, 8, 0));
    }

    #[test]
    fn test_working_minutes_between() {
        let cal = default_calendar();
        assert_eq!(cal.working_minutes_between(at(1, 8, 0), at(1, 10, 0)).unwrap(), 120);
        // Friday 15:00 -> Monday 09:00 is two working hours.
        assert_eq!(cal.working_minutes_between(at(3, 15, 0), at(6, 9, 0)).unwrap(), 120);
        assert_eq!(cal.working_minutes_between(at(6, 9, 0), at(3, 15, 0)).unwrap(), -120);
    }

    #[test]
    fn test_zero_working_days_is_invalid() {
        let config = CalendarConfig {
            working_days: HashSet::new(),
            ..CalendarConfig::default()
        };
        assert_eq!(
            WorkingCalendar::new(&config).unwrap_err(),
            CalendarError::NoWorkingDays
        );
    }

    #[test]
    fn test_non_positive_hours_is_invalid() {
        for hours in [0.0, -4.0, f64::NAN] {
            let config = CalendarConfig {
                hours_per_day: hours,
                ..CalendarConfig::default()
            };
            assert!(matches!(
                WorkingCalendar::new(&config),
                Err(CalendarError::NonPositiveHours(_))
            ));
        }
    }

    #[test]
    fn test_long_window_starts_earlier() {
        let config = CalendarConfig {
            hours_per_day: 20.0,
            ..CalendarConfig::default()
        };
        let cal = WorkingCalendar::new(&config).unwrap();
        assert_eq!(cal.day_start(), NaiveTime::from_hms_opt(4, 0, 0).unwrap());
        assert_eq!(cal.next_working_instant(at(1, 3, 0)).unwrap(), at(1, 4, 0));

        let config = CalendarConfig {
            hours_per_day: 24.0,
            ..CalendarConfig::default()
        };
        let cal = WorkingCalendar::new(&config).unwrap();
        assert_eq!(cal.day_start(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        // Wednesday 23:00 + 2h runs straight through midnight
        assert_eq!(cal.add_duration(at(1, 23, 0), 120).unwrap(), at(2, 1, 0));
    }

    #[test]
    fn test_more_than_24_hours_is_invalid() {
        let config = CalendarConfig {
            hours_per_day: 25.0,
            ..CalendarConfig::default()
        };
        assert_eq!(
            WorkingCalendar::new(&config).unwrap_err(),
            CalendarError::HoursExceedDay(25.0)
        );
    }

    #[test]
    fn test_multi_week_offsets_count_holidays() {
        let cal = default_calendar();
        // 100h = 12 full days plus 4h: Jan 1-16 then Friday the 17th.
        assert_eq!(cal.add_work_hours(at(1, 8, 0), 100.0).unwrap(), at(17, 12, 0));

        let mut config = CalendarConfig::default();
        config
            .holidays
            .insert(NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        let cal = WorkingCalendar::new(&config).unwrap();
        assert_eq!(cal.add_work_hours(at(1, 8, 0), 100.0).unwrap(), at(20, 12, 0));
        assert_eq!(cal.add_work_hours(at(20, 12, 0), -100.0).unwrap(), at(1, 8, 0));
        assert_eq!(cal.working_minutes_between(at(1, 8, 0), at(20, 12, 0)).unwrap(), 6000);
    }

    #[test]
    fn test_offset_beyond_date_range_fails_fast() {
        let cal = default_calendar();
        assert!(matches!(
            cal.add_duration(at(1, 8, 0), i64::MAX / 120),
            Err(CalendarError::OutOfRange(_))
        ));
        assert!(matches!(
            cal.add_duration(at(1, 8, 0), -(i64::MAX / 120)),
            Err(CalendarError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(parse_weekday("Lunes").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("MIÉRCOLES").unwrap(), Weekday::Wed);
        assert_eq!(parse_weekday(" sat ").unwrap(), Weekday::Sat);
        assert_eq!(
            parse_weekday("someday"),
            Err(CalendarError::UnknownWeekday("someday".to_string()))
        );
    }

    #[test]
    fn test_spanish_working_days() {
        let config = CalendarConfig {
            working_days: ["lunes", "martes", "miércoles", "jueves", "viernes", "sábado"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..CalendarConfig::default()
        };
        let cal = WorkingCalendar::new(&config).unwrap();
        // Friday 15:00 + 2h lands on Saturday now.
        assert_eq!(cal.add_duration(at(3, 15, 0), 120).unwrap(), at(4, 9, 0));
    }
}
