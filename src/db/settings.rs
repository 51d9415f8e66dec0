use crate::libs::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const SELECT_SETTING: &str = "SELECT value FROM settings WHERE key = ?1";
const INSERT_MISSING_SETTING: &str = "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)";

pub const LOCAL_UUID_KEY: &str = "local_uuid";

pub struct Settings<'a> {
    conn: &'a Connection,
}

impl<'a> Settings<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn.query_row(SELECT_SETTING, params![key], |row| row.get(0)).optional()?)
    }

    /// The uuid that tells this store's local tasks apart from other
    /// installations'. A configured uuid wins; otherwise the one recorded in
    /// the store is used, generated on first use. The first uuid ever used is
    /// the one recorded.
    pub fn local_uuid(&self, configured: Option<&str>) -> Result<String> {
        if let Some(uuid) = configured {
            self.conn.execute(INSERT_MISSING_SETTING, params![LOCAL_UUID_KEY, uuid])?;
            return Ok(uuid.to_string());
        }
        // Two processes may race here; whichever insert lands first is read back.
        self.conn
            .execute(INSERT_MISSING_SETTING, params![LOCAL_UUID_KEY, Uuid::new_v4().to_string()])?;
        Ok(self.conn.query_row(SELECT_SETTING, params![LOCAL_UUID_KEY], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_with_migrations;

    fn store() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        init_with_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn generated_uuid_is_kept() {
        let conn = store();
        let settings = Settings::new(&conn);
        let first = settings.local_uuid(None).unwrap();
        assert_eq!(settings.local_uuid(None).unwrap(), first);
        assert_eq!(settings.get(LOCAL_UUID_KEY).unwrap(), Some(first));
    }

    #[test]
    fn configured_uuid_wins_and_is_recorded_once() {
        let conn = store();
        let settings = Settings::new(&conn);
        assert_eq!(settings.local_uuid(Some("0000-test")).unwrap(), "0000-test");
        assert_eq!(settings.local_uuid(Some("1111-other")).unwrap(), "1111-other");
        assert_eq!(settings.local_uuid(None).unwrap(), "0000-test");
    }
}
