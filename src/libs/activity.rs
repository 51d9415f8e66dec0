//! A single contiguous interval of work on a task.
//!
//! Durations are computed against half-open ranges `[from, to)`. A calendar day
//! `D` is `[D 00:00, D+1 00:00)`, so midnight belongs to the following day and
//! an activity crossing it is split exactly there. An activity without an end
//! is treated as running up to the supplied `now`.

use super::error::{Error, Result};
use super::task::GlobalTaskId;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Generated by the store on first persist.
    pub id: Option<i64>,
    pub task: GlobalTaskId,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub label: Option<String>,
    pub comment: Option<String>,
}

impl Activity {
    pub fn new(task: GlobalTaskId, start: NaiveDateTime) -> Self {
        Self {
            id: None,
            task,
            start,
            end: None,
            label: None,
            comment: None,
        }
    }

    /// Closed interval constructor, mostly for imports and tests.
    pub fn between(task: GlobalTaskId, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let mut activity = Self::new(task, start);
        activity.set_end(end)?;
        Ok(activity)
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn set_end(&mut self, end: NaiveDateTime) -> Result<()> {
        if end < self.start {
            return Err(Error::InvalidInterval {
                start: self.start.to_string(),
                end: end.to_string(),
            });
        }
        self.end = Some(end);
        Ok(())
    }

    /// Elapsed time of the whole activity.
    pub fn duration(&self, now: NaiveDateTime) -> Duration {
        overlap(self.start, self.end.unwrap_or(now), self.start, self.end.unwrap_or(now))
    }

    /// The part of this activity that falls within `[from, to)`.
    pub fn duration_between(&self, from: NaiveDateTime, to: NaiveDateTime, now: NaiveDateTime) -> Duration {
        overlap(self.start, self.end.unwrap_or(now), from, to)
    }

    pub fn duration_on(&self, date: NaiveDate, now: NaiveDateTime) -> Duration {
        let (from, to) = day_bounds(date);
        self.duration_between(from, to, now)
    }

    /// Same intersection over whole days `[start 00:00, end 00:00)`.
    pub fn duration_over_range(&self, start: NaiveDate, end: NaiveDate, now: NaiveDateTime) -> Duration {
        self.duration_between(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN), now)
    }
}

/// Bounds of a calendar day as a half-open range.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let from = date.and_time(NaiveTime::MIN);
    (from, from + Duration::days(1))
}

/// Length of the intersection of `[start, end)` and `[from, to)`, never negative.
pub fn overlap(start: NaiveDateTime, end: NaiveDateTime, from: NaiveDateTime, to: NaiveDateTime) -> Duration {
    let lower = start.max(from);
    let upper = end.min(to);
    if upper > lower {
        upper - lower
    } else {
        Duration::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 3, d).unwrap()
    }

    fn task() -> GlobalTaskId {
        GlobalTaskId::new("test", "1")
    }

    #[test]
    fn cross_midnight_activity_is_split_at_midnight() {
        let a = Activity::between(task(), at(14, 22, 0), at(15, 2, 0)).unwrap();
        let now = at(20, 0, 0);
        assert_eq!(a.duration_on(date(14), now), Duration::hours(2));
        assert_eq!(a.duration_on(date(15), now), Duration::hours(2));
        assert_eq!(a.duration(now), Duration::hours(4));
    }

    #[test]
    fn activity_ending_at_midnight_contributes_nothing_to_next_day() {
        let a = Activity::between(task(), at(14, 20, 0), at(15, 0, 0)).unwrap();
        let now = at(20, 0, 0);
        assert_eq!(a.duration_on(date(14), now), Duration::hours(4));
        assert_eq!(a.duration_on(date(15), now), Duration::zero());
    }

    #[test]
    fn activity_starting_at_midnight_belongs_to_that_day() {
        let a = Activity::between(task(), at(16, 0, 0), at(16, 0, 0) + Duration::hours(25)).unwrap();
        let now = at(20, 0, 0);
        assert_eq!(a.duration_on(date(15), now), Duration::zero());
        assert_eq!(a.duration_on(date(16), now), Duration::hours(24));
        assert_eq!(a.duration_on(date(17), now), Duration::hours(1));
    }

    #[test]
    fn open_activity_runs_until_now() {
        let a = Activity::new(task(), at(14, 9, 0));
        assert_eq!(a.duration_on(date(14), at(14, 10, 30)), Duration::minutes(90));
        assert_eq!(a.duration_on(date(15), at(14, 10, 30)), Duration::zero());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut a = Activity::new(task(), at(14, 9, 0));
        assert!(matches!(a.set_end(at(14, 8, 59)), Err(Error::InvalidInterval { .. })));
        assert!(a.is_open());
    }

    #[test]
    fn range_equals_sum_of_days() {
        let a = Activity::between(task(), at(13, 23, 15), at(17, 1, 45)).unwrap();
        let now = at(30, 0, 0);
        let week: Duration = (0..7).map(|i| a.duration_on(date(12) + Duration::days(i), now)).fold(Duration::zero(), |acc, d| acc + d);
        assert_eq!(a.duration_over_range(date(12), date(19), now), week);
        assert_eq!(week, a.duration(now));
    }
}
