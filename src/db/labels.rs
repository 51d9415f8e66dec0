use super::session::{Entity, UnitOfWork};
use crate::libs::error::Result;
use crate::libs::label::ActivityLabel;
use rusqlite::{params, Connection, OptionalExtension, Row};

const UPSERT_LABEL: &str = "INSERT INTO activitylabel (name, color) VALUES (?1, ?2)
    ON CONFLICT(name) DO UPDATE SET color = excluded.color";
const DELETE_LABEL: &str = "DELETE FROM activitylabel WHERE name = ?1";
const CLEAR_ACTIVITY_LABEL: &str = "UPDATE activity SET label = NULL WHERE label = ?1";
const SELECT_ALL_LABELS: &str = "SELECT name, color FROM activitylabel ORDER BY name";
const SELECT_LABEL: &str = "SELECT name, color FROM activitylabel WHERE name = ?1";

/// The activity label catalog.
pub struct Labels<'a> {
    conn: &'a Connection,
}

impl<'a> Labels<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn from_row(row: &Row) -> rusqlite::Result<ActivityLabel> {
        Ok(ActivityLabel {
            name: row.get(0)?,
            color: row.get(1)?,
        })
    }

    /// Creates the label, or updates the color of an existing one.
    pub fn save(&self, label: &ActivityLabel) -> Result<()> {
        self.conn.execute(UPSERT_LABEL, params![label.name, label.color])?;
        Ok(())
    }

    /// Removes the label and detaches it from every activity using it.
    /// Returns false when no such label existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        self.conn.execute(CLEAR_ACTIVITY_LABEL, params![name])?;
        Ok(self.conn.execute(DELETE_LABEL, params![name])? > 0)
    }

    pub fn list(&self) -> Result<Vec<ActivityLabel>> {
        let mut stmt = self.conn.prepare(SELECT_ALL_LABELS)?;
        let labels = stmt.query_map([], Self::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    pub fn get(&self, name: &str) -> Result<Option<ActivityLabel>> {
        Ok(self.conn.query_row(SELECT_LABEL, params![name], Self::from_row).optional()?)
    }
}

impl Entity for ActivityLabel {
    type Key = str;

    fn find(uow: &UnitOfWork, key: &str) -> Result<Option<Self>> {
        Labels::new(uow.conn()).get(key)
    }

    fn find_all(uow: &UnitOfWork) -> Result<Vec<Self>> {
        Labels::new(uow.conn()).list()
    }

    fn persist(&mut self, uow: &UnitOfWork) -> Result<()> {
        Labels::new(uow.conn()).save(self)
    }

    fn delete(&self, uow: &UnitOfWork) -> Result<()> {
        Labels::new(uow.conn()).delete(&self.name).map(|_| ())
    }
}
