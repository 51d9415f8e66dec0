#[derive(Debug, Clone)]
pub enum Message {
    // === ACTIVITY MESSAGES ===
    ActivityStarted(String, String),
    ActivityAlreadyRunning(String, String),
    ActivityEnded(String, String),
    ActivityReactivated(String),
    TaskIdle(String),
    InvalidDateTime(String),

    // === TASK MESSAGES ===
    TasksHeader,
    TasksWeekHeader(String),
    TasksProjectHeader(String),
    TasksNotFound,

    // === REPORT MESSAGES ===
    WeekReportHeader(String, String),

    // === LABEL MESSAGES ===
    LabelSaved(String),
    LabelRemoved(String),
    LabelNotFound(String),
    LabelsHeader,
    NoLabels,

    // === TRANSFER MESSAGES ===
    ExportSuccess(usize, String),
    ImportSuccess(usize, String),

    // === CONFIG MESSAGES ===
    ConfigSaved(String),
    DatabaseLocation(String),
    DatabaseUnavailable(String),

    // === MIGRATION MESSAGES ===
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationFailed(u32, String),
    MigrationsCompleted(u32),
    DbVersion(u32),
    LatestVersion(u32),
    MigrationsPending,
    MigrationHistoryHeader,
    NoMigrationHistory,
}
