use super::activities::Activities;
use super::projects::Projects;
use super::session::{Entity, UnitOfWork};
use crate::libs::error::{Error, Result};
use crate::libs::project::Project;
use crate::libs::task::{GlobalTaskId, Task};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const INSERT_TASK: &str = "INSERT INTO trackedtask (repository_url, task_id, task_project, task_url, task_summary)
    VALUES (?1, ?2, ?3, ?4, ?5)";
const UPSERT_TASK: &str = "INSERT INTO trackedtask (repository_url, task_id, task_project, task_url, task_summary)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(repository_url, task_id) DO UPDATE SET
        task_project = excluded.task_project,
        task_url = excluded.task_url,
        task_summary = excluded.task_summary";
const UPDATE_CURRENT: &str = "UPDATE trackedtask SET current_activity_id = ?3 WHERE repository_url = ?1 AND task_id = ?2";
const DELETE_TASK: &str = "DELETE FROM trackedtask WHERE repository_url = ?1 AND task_id = ?2";
const SELECT_TASK: &str = "SELECT repository_url, task_id, task_project, task_url, task_summary, current_activity_id
    FROM trackedtask WHERE repository_url = ?1 AND task_id = ?2";
const SELECT_ALL_TASKS: &str = "SELECT repository_url, task_id, task_project, task_url, task_summary, current_activity_id
    FROM trackedtask ORDER BY repository_url, task_id";
const SELECT_PROJECT_TASKS: &str = "SELECT repository_url, task_id, task_project, task_url, task_summary, current_activity_id
    FROM trackedtask WHERE task_project = ?1 ORDER BY repository_url, task_id";
const SELECT_TASKS_TOUCHING: &str = "SELECT DISTINCT t.repository_url, t.task_id, t.task_project, t.task_url, t.task_summary, t.current_activity_id
    FROM trackedtask t
    JOIN activity a ON a.repository_url = t.repository_url AND a.task_id = t.task_id
    WHERE a.start_time < ?2 AND (a.end_time IS NULL OR a.end_time > ?1)
    ORDER BY t.repository_url, t.task_id";

struct TaskRow {
    id: GlobalTaskId,
    project: Option<String>,
    url: Option<String>,
    summary: Option<String>,
    current: Option<i64>,
}

/// Tracked tasks, loaded and stored together with their activities.
pub struct Tasks<'a> {
    conn: &'a Connection,
}

impl<'a> Tasks<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row) -> rusqlite::Result<TaskRow> {
        Ok(TaskRow {
            id: GlobalTaskId::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
            project: row.get(2)?,
            url: row.get(3)?,
            summary: row.get(4)?,
            current: row.get(5)?,
        })
    }

    fn assemble(&self, row: TaskRow) -> Result<Task> {
        // The project column is a soft reference; an imported task may name a
        // project this store has never seen.
        let project = match row.project {
            Some(title) => Some(Projects::new(self.conn).get(&title)?.unwrap_or(Project {
                title,
                project_type: None,
            })),
            None => None,
        };
        let activities = Activities::new(self.conn).for_task(&row.id)?;
        let mut task = Task::new(row.id, row.summary.unwrap_or_default());
        task.project = project;
        task.url = row.url;
        Ok(task.restore(activities, row.current))
    }

    fn load(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| self.assemble(row)).collect()
    }

    pub fn get(&self, id: &GlobalTaskId) -> Result<Option<Task>> {
        let row = self
            .conn
            .query_row(SELECT_TASK, params![id.repository_url, id.task_id], Self::from_row)
            .optional()?;
        row.map(|row| self.assemble(row)).transpose()
    }

    pub fn list(&self) -> Result<Vec<Task>> {
        self.load(SELECT_ALL_TASKS, [])
    }

    pub fn list_by_project(&self, title: &str) -> Result<Vec<Task>> {
        self.load(SELECT_PROJECT_TASKS, params![title])
    }

    /// Tasks with at least one activity overlapping `[from, to)`, counting open
    /// activities as running on indefinitely.
    pub fn list_touching(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<Task>> {
        self.load(SELECT_TASKS_TOUCHING, params![from, to])
    }

    /// Inserts a task row that must not exist yet.
    pub fn create(&self, task: &Task) -> Result<()> {
        self.conn
            .execute(
                INSERT_TASK,
                params![task.id.repository_url, task.id.task_id, project_title(task), task.url, task.summary],
            )
            .map_err(|e| Error::on_insert(e, "Task", &task.id.to_string()))?;
        Ok(())
    }

    /// Writes the task row only, leaving its activities untouched.
    pub fn save_row(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            UPSERT_TASK,
            params![task.id.repository_url, task.id.task_id, project_title(task), task.url, task.summary],
        )?;
        Ok(())
    }

    /// Writes the task, all of its activities and its current pointer.
    pub fn save(&self, task: &mut Task) -> Result<()> {
        self.save_row(task)?;
        let activities = Activities::new(self.conn);
        for activity in task.activities_mut() {
            activities.save(activity)?;
        }
        self.set_current(task)
    }

    pub fn set_current(&self, task: &Task) -> Result<()> {
        let current = task.current_activity().and_then(|a| a.id);
        self.conn
            .execute(UPDATE_CURRENT, params![task.id.repository_url, task.id.task_id, current])?;
        Ok(())
    }

    /// Removes the task; its activities and links go with it.
    pub fn delete(&self, id: &GlobalTaskId) -> Result<bool> {
        Ok(self.conn.execute(DELETE_TASK, params![id.repository_url, id.task_id])? > 0)
    }
}

fn project_title(task: &Task) -> Option<&str> {
    task.project.as_ref().map(|p| p.title.as_str())
}

impl Entity for Task {
    type Key = GlobalTaskId;

    fn find(uow: &UnitOfWork, key: &GlobalTaskId) -> Result<Option<Self>> {
        Tasks::new(uow.conn()).get(key)
    }

    fn find_all(uow: &UnitOfWork) -> Result<Vec<Self>> {
        Tasks::new(uow.conn()).list()
    }

    fn persist(&mut self, uow: &UnitOfWork) -> Result<()> {
        Tasks::new(uow.conn()).save(self)
    }

    fn delete(&self, uow: &UnitOfWork) -> Result<()> {
        Tasks::new(uow.conn()).delete(&self.id).map(|_| ())
    }
}
