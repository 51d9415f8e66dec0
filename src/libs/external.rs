//! The boundary to whatever owns the real tasks (an issue tracker, a local
//! task list). Timekeeper only reads from it.

use super::project::UNDETERMINED_PROJECT;

/// Repository id reserved for tasks that live only in this installation.
pub const LOCAL_REPOSITORY: &str = "local";

/// Read-only view of a task owned by an external provider.
pub trait ExternalTask {
    fn external_id(&self) -> &str;

    /// Repository the task lives in, or [`LOCAL_REPOSITORY`].
    fn repository_id(&self) -> &str;

    fn url(&self) -> Option<&str>;

    fn summary(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Name of the container holding the task, used as project title.
    fn project_name(&self) -> &str {
        UNDETERMINED_PROJECT
    }

    /// Kind of connector the task came from, used as project type.
    fn connector_kind(&self) -> &str {
        self.repository_id()
    }
}

/// Plain-data implementation of [`ExternalTask`].
#[derive(Debug, Clone, Default)]
pub struct TaskView {
    pub external_id: String,
    pub repository_id: String,
    pub url: Option<String>,
    pub summary: String,
    pub active: bool,
    pub project: Option<String>,
    pub kind: Option<String>,
}

impl TaskView {
    pub fn new(repository_id: impl Into<String>, external_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            repository_id: repository_id.into(),
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn local(external_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::new(LOCAL_REPOSITORY, external_id, summary)
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl ExternalTask for TaskView {
    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn project_name(&self) -> &str {
        self.project.as_deref().unwrap_or(UNDETERMINED_PROJECT)
    }

    fn connector_kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.repository_id)
    }
}
