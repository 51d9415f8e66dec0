//! Projects group tasks; project types categorise projects by their source.

use serde::{Deserialize, Serialize};

/// Project name used when the task source cannot tell which container holds a task.
pub const UNDETERMINED_PROJECT: &str = "[UNDETERMINED]";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectType {
    pub name: String,
}

impl ProjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub project_type: Option<ProjectType>,
}

impl Project {
    pub fn new(project_type: ProjectType, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            project_type: Some(project_type),
        }
    }
}
