//! Text of every [`Message`].

use super::types::Message;
use std::fmt;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            // === ACTIVITY MESSAGES ===
            Message::ActivityStarted(task, time) => format!("Started working on {} at {}", task, time),
            Message::ActivityAlreadyRunning(task, time) => format!("{} is already active since {}", task, time),
            Message::ActivityEnded(task, duration) => format!("Stopped working on {} after {}", task, duration),
            Message::ActivityReactivated(task) => format!("Started a new activity on {}", task),
            Message::TaskIdle(task) => format!("{} is not active", task),
            Message::InvalidDateTime(value) => format!("Invalid date/time '{}', expected YYYY-MM-DD HH:MM", value),

            // === TASK MESSAGES ===
            Message::TasksHeader => "Tracked tasks".to_string(),
            Message::TasksWeekHeader(date) => format!("Tasks with activity in the week starting {}", date),
            Message::TasksProjectHeader(project) => format!("Tasks in project {}", project),
            Message::TasksNotFound => "No tasks found".to_string(),

            // === REPORT MESSAGES ===
            Message::WeekReportHeader(from, to) => format!("Week {} - {}", from, to),

            // === LABEL MESSAGES ===
            Message::LabelSaved(name) => format!("Label '{}' saved", name),
            Message::LabelRemoved(name) => format!("Label '{}' removed", name),
            Message::LabelNotFound(name) => format!("Label '{}' not found", name),
            Message::LabelsHeader => "Activity labels".to_string(),
            Message::NoLabels => "No labels defined".to_string(),

            // === TRANSFER MESSAGES ===
            Message::ExportSuccess(rows, dir) => format!("Exported {} rows to {}", rows, dir),
            Message::ImportSuccess(rows, dir) => format!("Imported {} rows from {}", rows, dir),

            // === CONFIG MESSAGES ===
            Message::ConfigSaved(path) => format!("Configuration saved to {}", path),
            Message::DatabaseLocation(path) => format!("Database: {}", path),
            Message::DatabaseUnavailable(location) => format!("Database at {} is unavailable", location),

            // === MIGRATION MESSAGES ===
            Message::MigrationsFound(count) => format!("Found {} pending migrations", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationFailed(version, error) => format!("Migration v{} failed: {}", version, error),
            Message::MigrationsCompleted(version) => format!("Database migrated to version {}", version),
            Message::DbVersion(version) => format!("Current database version: {}", version),
            Message::LatestVersion(version) => format!("Latest available version: {}", version),
            Message::MigrationsPending => "Database needs migration".to_string(),
            Message::MigrationHistoryHeader => "Migration history:".to_string(),
            Message::NoMigrationHistory => "No migrations applied".to_string(),
        };
        write!(f, "{}", s)
    }
}
