use crate::libs::activity::Activity;
use crate::libs::error::{Error, Result};
use crate::libs::task::GlobalTaskId;
use rusqlite::{params, Connection, Row};

const INSERT_ACTIVITY: &str = "INSERT INTO activity (repository_url, task_id, start_time, end_time, label, comment)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const INSERT_TASK_ACTIVITY: &str = "INSERT INTO trackedtask_activity (task_repository_url, task_task_id, activities_id)
    VALUES (?1, ?2, ?3)";
const UPDATE_ACTIVITY: &str = "UPDATE activity SET start_time = ?2, end_time = ?3, label = ?4, comment = ?5 WHERE id = ?1";
const SELECT_TASK_ACTIVITIES: &str = "SELECT id, repository_url, task_id, start_time, end_time, label, comment
    FROM activity WHERE repository_url = ?1 AND task_id = ?2 ORDER BY start_time, id";

pub struct Activities<'a> {
    conn: &'a Connection,
}

impl<'a> Activities<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Activity> {
        Ok(Activity {
            id: row.get(0)?,
            task: GlobalTaskId::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            start: row.get(3)?,
            end: row.get(4)?,
            label: row.get(5)?,
            comment: row.get(6)?,
        })
    }

    /// Activities of one task in start order.
    pub fn for_task(&self, task: &GlobalTaskId) -> Result<Vec<Activity>> {
        let mut stmt = self.conn.prepare(SELECT_TASK_ACTIVITIES)?;
        let activities = stmt
            .query_map(params![task.repository_url, task.task_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(activities)
    }

    /// Inserts a new activity together with its ownership link and stores the
    /// generated id, or rewrites an existing one.
    pub fn save(&self, activity: &mut Activity) -> Result<()> {
        match activity.id {
            Some(id) => {
                let changed = self.conn.execute(
                    UPDATE_ACTIVITY,
                    params![id, activity.start, activity.end, activity.label, activity.comment],
                )?;
                if changed == 0 {
                    return Err(Error::ActivityNotFound(id));
                }
            }
            None => {
                self.conn.execute(
                    INSERT_ACTIVITY,
                    params![
                        activity.task.repository_url,
                        activity.task.task_id,
                        activity.start,
                        activity.end,
                        activity.label,
                        activity.comment
                    ],
                )?;
                let id = self.conn.last_insert_rowid();
                self.conn.execute(
                    INSERT_TASK_ACTIVITY,
                    params![activity.task.repository_url, activity.task.task_id, id],
                )?;
                activity.id = Some(id);
            }
        }
        Ok(())
    }
}
