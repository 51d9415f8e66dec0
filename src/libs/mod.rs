//! Domain model and services.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timekeeper::libs::config::Config;
//! use timekeeper::libs::external::TaskView;
//! use timekeeper::libs::service::Timekeeper;
//!
//! let service = Timekeeper::open(Config::with_database("/tmp/timekeeper.db"))?;
//! let task = service.get_or_link_task(&TaskView::local("1", "Write docs"))?;
//! service.start_activity(&task)?;
//! service.end_activity(&task, None, false)?;
//! # Ok::<(), timekeeper::libs::error::Error>(())
//! ```

pub mod activity;
pub mod config;
pub mod data_storage;
pub mod error;
pub mod export;
pub mod external;
pub mod formatter;
pub mod label;
pub mod listeners;
pub mod logging;
pub mod messages;
pub mod project;
pub mod report;
pub mod service;
pub mod task;
pub mod view;
