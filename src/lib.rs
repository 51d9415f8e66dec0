//! # Timekeeper - task time tracking with durable activity storage
//!
//! Records the intervals spent working on tasks from any repository,
//! aggregates them per day and week, and moves the full dataset in and out
//! of CSV files.
//!
//! ## Features
//!
//! - **Activity Lifecycle**: Start, end and reactivate work on a task, with a
//!   cleanup heuristic for activities left open
//! - **Unit of Work**: Per-worker sessions with nested, all-or-nothing transactions
//! - **Aggregation**: Durations per day, per range and per week
//! - **Catalogs**: Projects, project types and activity labels
//! - **Data Transfer**: Lossless CSV export and merging import
//! - **Readiness**: Asynchronous store startup with listener notifications
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timekeeper::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod db;
pub mod libs;
