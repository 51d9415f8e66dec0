//! The tracked task aggregate and its activity state machine.
//!
//! A [`Task`] owns its activities. At most one of them is open (no end time),
//! and when one is, `current` points at it. The methods here are pure state
//! transitions; locking and persistence live in the service.

use super::activity::Activity;
use super::error::{Error, Result};
use super::project::Project;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Step used by the cleanup heuristic when searching for the real end of work.
pub const CLEANUP_WINDOW_MINUTES: i64 = 30;

/// A task shared between workers. The mutex is the per-task lock that orders
/// all lifecycle operations on it.
pub type TaskRef = Arc<Mutex<Task>>;

/// Composite identity of a task: repository plus the id within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalTaskId {
    pub repository_url: String,
    pub task_id: String,
}

impl GlobalTaskId {
    pub fn new(repository_url: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for GlobalTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository_url, self.task_id)
    }
}

/// Whether the task could be matched with a repository known to this installation.
/// Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskLinkStatus {
    #[default]
    Undetermined,
    Linked,
    Unlinked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: GlobalTaskId,
    pub project: Option<Project>,
    pub url: Option<String>,
    pub summary: String,
    pub link_status: TaskLinkStatus,
    activities: Vec<Activity>,
    current: Option<usize>,
}

impl Task {
    pub fn new(id: GlobalTaskId, summary: impl Into<String>) -> Self {
        Self {
            id,
            project: None,
            url: None,
            summary: summary.into(),
            link_status: TaskLinkStatus::Undetermined,
            activities: Vec::new(),
            current: None,
        }
    }

    /// Rebuilds a task from stored rows. An open activity is taken as current
    /// even if the stored pointer was lost.
    pub(crate) fn restore(mut self, activities: Vec<Activity>, current_id: Option<i64>) -> Self {
        self.current = current_id
            .and_then(|id| activities.iter().position(|a| a.id == Some(id) && a.is_open()))
            .or_else(|| activities.iter().rposition(Activity::is_open));
        self.activities = activities;
        self
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// Adds an activity recorded elsewhere, e.g. by hand. An open one becomes
    /// the current activity, so only one may be added while the task is idle.
    pub fn add_activity(&mut self, activity: Activity) -> Result<()> {
        if activity.is_open() {
            if self.current.is_some() {
                return Err(Error::ActivityRunning(self.id.to_string()));
            }
            self.current = Some(self.activities.len());
        }
        self.activities.push(activity);
        Ok(())
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        self.current.map(|i| &self.activities[i])
    }

    pub(crate) fn activities_mut(&mut self) -> &mut [Activity] {
        &mut self.activities
    }

    pub(crate) fn current_activity_mut(&mut self) -> Option<&mut Activity> {
        let i = self.current?;
        self.activities.get_mut(i)
    }

    pub(crate) fn activity_mut(&mut self, id: i64) -> Option<&mut Activity> {
        self.activities.iter_mut().find(|a| a.id == Some(id))
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Idle → Active. Starting an already active task returns the running
    /// activity and creates nothing. The flag tells whether a new one was made.
    pub fn start_activity(&mut self, at: NaiveDateTime) -> (&mut Activity, bool) {
        match self.current {
            Some(i) => (&mut self.activities[i], false),
            None => {
                self.activities.push(Activity::new(self.id.clone(), at));
                let i = self.activities.len() - 1;
                self.current = Some(i);
                (&mut self.activities[i], true)
            }
        }
    }

    /// Active → Idle. Returns the closed activity, or `None` when idle.
    pub fn end_activity(&mut self, at: NaiveDateTime) -> Result<Option<Activity>> {
        let Some(i) = self.current else {
            return Ok(None);
        };
        self.activities[i].set_end(at)?;
        self.current = None;
        Ok(Some(self.activities[i].clone()))
    }

    /// Estimates when work really stopped on an activity left open.
    ///
    /// Walks forward from the activity start in 30 minute windows, asking
    /// `elapsed` how much real activity happened in each. Stops at the first
    /// idle window, or at the window that reaches `now`, and ends the activity
    /// at that window's end (never later than `now`).
    pub fn clean_up<F>(&mut self, now: NaiveDateTime, mut elapsed: F) -> Result<Option<Activity>>
    where
        F: FnMut(NaiveDateTime, NaiveDateTime) -> Duration,
    {
        let Some(start) = self.current_activity().map(|a| a.start) else {
            return Ok(None);
        };
        let step = Duration::minutes(CLEANUP_WINDOW_MINUTES);
        let mut from = start;
        let mut to = start + step;
        loop {
            if to >= now || elapsed(from, to).is_zero() {
                break;
            }
            from = to;
            to += step;
        }
        self.end_activity(to.min(now).max(start))
    }

    /// Time spent on this task on the given calendar day.
    pub fn duration_on(&self, date: NaiveDate, now: NaiveDateTime) -> Duration {
        self.activities
            .iter()
            .map(|a| a.duration_on(date, now))
            .fold(Duration::zero(), |total, d| total + d)
    }

    /// Time spent on this task in the days `[start, end)`.
    pub fn duration_over_range(&self, start: NaiveDate, end: NaiveDate, now: NaiveDateTime) -> Duration {
        self.activities
            .iter()
            .map(|a| a.duration_over_range(start, end, now))
            .fold(Duration::zero(), |total, d| total + d)
    }

    /// True when any activity intersects the seven days starting at `start`.
    pub fn has_activity_in_week(&self, start: NaiveDate, now: NaiveDateTime) -> bool {
        !self.duration_over_range(start, start + Duration::days(7), now).is_zero()
    }

    pub fn link(&mut self, repositories: &[String]) -> TaskLinkStatus {
        self.link_status = if repositories.iter().any(|r| *r == self.id.repository_url) {
            TaskLinkStatus::Linked
        } else {
            TaskLinkStatus::Unlinked
        };
        self.link_status
    }
}
