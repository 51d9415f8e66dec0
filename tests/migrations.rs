#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use timekeeper::db::migrations::{get_db_version, init_with_migrations, needs_migration, MigrationManager};

    #[test]
    fn test_fresh_database_needs_migration() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_db_version(&conn).unwrap(), 0);
        assert!(needs_migration(&conn).unwrap());
    }

    #[test]
    fn test_migrations_create_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_with_migrations(&mut conn).unwrap();

        let manager = MigrationManager::new();
        assert_eq!(get_db_version(&conn).unwrap(), manager.latest_version());
        assert!(!needs_migration(&conn).unwrap());
        assert!(manager.is_migration_applied(&conn, 1).unwrap());

        for table in ["projecttype", "project", "trackedtask", "activity", "trackedtask_activity", "activitylabel", "settings"] {
            let found: i64 = conn
                .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1", [table], |r| r.get(0))
                .unwrap();
            assert_eq!(found, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_with_migrations(&mut conn).unwrap();
        init_with_migrations(&mut conn).unwrap();

        let history = MigrationManager::new().get_migration_history(&conn).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].0, 1);
        assert_eq!(history[1].1, "add_activity_indices");
        assert_eq!(history[2].1, "create_settings_table");
    }

    #[test]
    fn test_activity_end_before_start_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_with_migrations(&mut conn).unwrap();
        conn.execute_batch("INSERT INTO trackedtask (repository_url, task_id) VALUES ('r', '1')").unwrap();
        let result = conn.execute(
            "INSERT INTO activity (repository_url, task_id, start_time, end_time) VALUES ('r', '1', '2016-03-14 10:00:00', '2016-03-14 09:00:00')",
            [],
        );
        assert!(result.is_err());
    }
}
