//! Weekly time sheet built from task activities.

use super::task::{GlobalTaskId, Task};
use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const DAYS_IN_WEEK: usize = 7;

/// Time on one task for each day of the week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekRow {
    pub task: GlobalTaskId,
    pub summary: String,
    pub days: [Duration; DAYS_IN_WEEK],
    pub total: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekReport {
    pub start: NaiveDate,
    pub rows: Vec<WeekRow>,
    pub day_totals: [Duration; DAYS_IN_WEEK],
    pub total: Duration,
}

impl WeekReport {
    /// Sums each task's time per day for the seven days from `start`. Tasks
    /// without any time in that week are left out.
    pub fn build(tasks: &[Task], start: NaiveDate, now: NaiveDateTime) -> Self {
        let dates = week_dates(start);
        let mut rows = Vec::new();
        let mut day_totals = [Duration::zero(); DAYS_IN_WEEK];

        for task in tasks.iter().filter(|t| t.has_activity_in_week(start, now)) {
            let mut days = [Duration::zero(); DAYS_IN_WEEK];
            for (i, date) in dates.iter().enumerate() {
                days[i] = task.duration_on(*date, now);
                day_totals[i] += days[i];
            }
            rows.push(WeekRow {
                task: task.id.clone(),
                summary: task.summary.clone(),
                total: days.iter().fold(Duration::zero(), |acc, d| acc + *d),
                days,
            });
        }
        rows.sort_by(|a, b| a.task.cmp(&b.task));

        let total = day_totals.iter().fold(Duration::zero(), |acc, d| acc + *d);
        Self {
            start,
            rows,
            day_totals,
            total,
        }
    }

    pub fn dates(&self) -> [NaiveDate; DAYS_IN_WEEK] {
        week_dates(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn week_dates(start: NaiveDate) -> [NaiveDate; DAYS_IN_WEEK] {
    let mut dates = [start; DAYS_IN_WEEK];
    for (i, date) in dates.iter_mut().enumerate() {
        *date = start + Duration::days(i as i64);
    }
    dates
}
