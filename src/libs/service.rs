//! The timekeeper service: task lookup, activity lifecycle, labels, projects
//! and bulk transfer on top of the unit-of-work store.
//!
//! Tasks handed out by the service are shared [`TaskRef`]s kept in an identity
//! map, one per [`GlobalTaskId`]. Every lifecycle operation locks the task
//! first and only then opens a unit of work; no code path takes a task lock
//! while a unit of work is open. On a failed write the in-memory task is put
//! back the way it was.
//!
//! ```rust,no_run
//! use timekeeper::libs::config::Config;
//! use timekeeper::libs::external::TaskView;
//! use timekeeper::libs::service::Timekeeper;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Timekeeper::spawn(Config::read()?)?;
//!     service.ready().await?;
//!     let task = service.get_or_link_task(&TaskView::local("1", "Write docs"))?;
//!     service.start_activity(&task)?;
//!     Ok(())
//! }
//! ```

use super::activity::Activity;
use super::config::Config;
use super::error::{Error, Result};
use super::export::{Exporter, Importer};
use super::external::{ExternalTask, LOCAL_REPOSITORY};
use super::label::ActivityLabel;
use super::listeners::{ListenerId, Listeners, StoreEvent, StoreListener};
use super::project::Project;
use super::task::{GlobalTaskId, Task, TaskLinkStatus, TaskRef};
use crate::db::activities::Activities;
use crate::db::db::Db;
use crate::db::labels::Labels;
use crate::db::migrations::init_with_migrations;
use crate::db::projects::Projects;
use crate::db::settings::Settings;
use crate::db::session::{SessionManager, UnitOfWork};
use crate::db::tasks::Tasks;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Connection state of a service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Connecting,
    Ready,
    /// Connecting failed; the instance stays unusable.
    Failed(String),
    Closed,
}

struct Inner {
    db: Db,
    repositories: Vec<String>,
    configured_uuid: Option<String>,
    local_uuid: OnceLock<String>,
    store: OnceLock<SessionManager>,
    state: watch::Sender<ServiceState>,
    tasks: Mutex<HashMap<GlobalTaskId, TaskRef>>,
    listeners: Listeners,
    ready_generation: AtomicU64,
}

/// Handle to a running service. Clones share the same instance.
#[derive(Clone)]
pub struct Timekeeper {
    inner: Arc<Inner>,
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Timekeeper {
    fn new(config: Config) -> Result<Self> {
        let db = config.db()?;
        let (state, _) = watch::channel(ServiceState::Connecting);
        Ok(Self {
            inner: Arc::new(Inner {
                db,
                repositories: config.repositories,
                configured_uuid: config.local_uuid,
                local_uuid: OnceLock::new(),
                store: OnceLock::new(),
                state,
                tasks: Mutex::new(HashMap::new()),
                listeners: Listeners::new(),
                ready_generation: AtomicU64::new(0),
            }),
        })
    }

    /// Connects on the calling thread and returns once the store is ready.
    pub fn open(config: Config) -> Result<Self> {
        let service = Self::new(config)?;
        service.connect();
        match service.state() {
            ServiceState::Ready => Ok(service),
            ServiceState::Failed(reason) => Err(service.connection_failure(reason)),
            _ => Err(Error::NotReady),
        }
    }

    /// Returns at once and connects on a background thread. Use
    /// [`Timekeeper::ready`] or a listener to learn when requests may be made.
    pub fn spawn(config: Config) -> Result<Self> {
        let service = Self::new(config)?;
        let worker = service.clone();
        thread::Builder::new()
            .name("timekeeper-connect".to_string())
            .spawn(move || worker.connect())
            .map_err(|e| service.connection_failure(e.to_string()))?;
        Ok(service)
    }

    fn connect(&self) {
        let db = &self.inner.db;
        let prepared = db.connect().and_then(|mut conn| {
            init_with_migrations(&mut conn)?;
            let local_uuid = Settings::new(&conn).local_uuid(self.inner.configured_uuid.as_deref())?;
            Ok(local_uuid)
        });
        let local_uuid = match prepared {
            Ok(local_uuid) => local_uuid,
            Err(e) => {
                let reason = e.to_string();
                error!("Timekeeper database at {} is unavailable: {}", db.location().display(), reason);
                self.inner.state.send_if_modified(|state| match state {
                    ServiceState::Connecting => {
                        *state = ServiceState::Failed(reason);
                        true
                    }
                    _ => false,
                });
                return;
            }
        };

        let _ = self.inner.local_uuid.set(local_uuid);
        let _ = self.inner.store.set(SessionManager::new(db.clone()));
        let generation = self.inner.listeners.next_generation();
        self.inner.ready_generation.store(generation, Ordering::Release);
        let became_ready = self.inner.state.send_if_modified(|state| match state {
            ServiceState::Connecting => {
                *state = ServiceState::Ready;
                true
            }
            _ => false,
        });
        if became_ready {
            info!("Timekeeper database ready at {}", db.location().display());
            self.inner.listeners.deliver(StoreEvent::Ready, generation);
        }
    }

    fn connection_failure(&self, reason: String) -> Error {
        Error::ConnectionFailure {
            location: self.inner.db.location().display().to_string(),
            reason,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.inner.state.subscribe()
    }

    /// Waits until connecting has finished one way or the other.
    pub async fn ready(&self) -> Result<()> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| *state != ServiceState::Connecting)
            .await
            .map_err(|_| Error::Closed)?
            .clone();
        match state {
            ServiceState::Ready => Ok(()),
            ServiceState::Failed(reason) => Err(self.connection_failure(reason)),
            ServiceState::Closed => Err(Error::Closed),
            ServiceState::Connecting => Err(Error::NotReady),
        }
    }

    pub fn location(&self) -> &Path {
        self.inner.db.location()
    }

    fn store(&self) -> Result<&SessionManager> {
        match self.state() {
            ServiceState::Ready => self.inner.store.get().ok_or(Error::NotReady),
            ServiceState::Closed => Err(Error::Closed),
            _ => Err(Error::NotReady),
        }
    }

    /// Runs `work` in the calling worker's unit of work.
    pub fn with_unit_of_work<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork) -> Result<T>,
    {
        self.store()?.with_unit_of_work(work)
    }

    /// Registers a listener. One registered after the store became ready is
    /// told so right away.
    pub fn add_listener(&self, listener: Arc<dyn StoreListener>) -> ListenerId {
        let id = self.inner.listeners.register(listener);
        if self.is_ready() {
            let generation = self.inner.ready_generation.load(Ordering::Acquire);
            self.inner.listeners.deliver_to(id, StoreEvent::Ready, generation);
        }
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.unregister(id)
    }

    /// Uuid appended to local task ids: the configured one, or else the one
    /// the store recorded when it was first opened. Known once ready.
    pub fn local_uuid(&self) -> Option<&str> {
        self.inner
            .local_uuid
            .get()
            .or(self.inner.configured_uuid.as_ref())
            .map(String::as_str)
    }

    /// Repository part of the task identity. Local tasks get the installation
    /// uuid appended so that two installations never share ids.
    pub fn repository_url(&self, view: &dyn ExternalTask) -> String {
        let repository = view.repository_id();
        if repository == LOCAL_REPOSITORY {
            format!("{}-{}", repository, self.local_uuid().unwrap_or_default())
        } else {
            repository.to_string()
        }
    }

    pub fn task_id(&self, view: &dyn ExternalTask) -> GlobalTaskId {
        GlobalTaskId::new(self.repository_url(view), view.external_id())
    }

    fn cached(&self, id: &GlobalTaskId) -> Option<TaskRef> {
        self.inner.tasks.lock().get(id).cloned()
    }

    /// Adds a freshly loaded task to the identity map unless another worker
    /// got there first, and returns whichever copy is shared.
    fn share(&self, task: Task) -> TaskRef {
        let mut tasks = self.inner.tasks.lock();
        tasks
            .entry(task.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(task)))
            .clone()
    }

    fn share_all(&self, tasks: Vec<Task>) -> Vec<TaskRef> {
        tasks.into_iter().map(|task| self.share(task)).collect()
    }

    /// Brings summary and url in line with the external task.
    fn synchronize(&self, task_ref: &TaskRef, view: &dyn ExternalTask) -> Result<()> {
        let mut task = task_ref.lock();
        let url = view.url().map(str::to_string);
        if task.summary == view.summary() && task.url == url {
            return Ok(());
        }
        let snapshot = task.clone();
        task.summary = view.summary().to_string();
        task.url = url;
        debug!("Synchronizing task {}", task.id);
        let result = self.with_unit_of_work(|uow| Tasks::new(uow.conn()).save_row(&task));
        if result.is_err() {
            *task = snapshot;
        }
        result
    }

    /// Looks a task up without creating it.
    pub fn find_task(&self, view: &dyn ExternalTask) -> Result<Option<TaskRef>> {
        let id = self.task_id(view);
        debug!("Looking up task {}", id);
        let task_ref = match self.cached(&id) {
            Some(task_ref) => task_ref,
            None => match self.with_unit_of_work(|uow| Tasks::new(uow.conn()).get(&id))? {
                Some(task) => self.share(task),
                None => return Ok(None),
            },
        };
        self.synchronize(&task_ref, view)?;
        Ok(Some(task_ref))
    }

    fn insert_task(&self, uow: &UnitOfWork, id: GlobalTaskId, view: &dyn ExternalTask) -> Result<Task> {
        let project = Projects::new(uow.conn()).get_or_create(view.project_name(), view.connector_kind())?;
        let mut task = Task::new(id, view.summary());
        task.project = Some(project);
        task.url = view.url().map(str::to_string);
        Tasks::new(uow.conn()).create(&task)?;
        debug!("Created task {}", task.id);
        Ok(task)
    }

    /// Creates a task that must not exist yet. An existing one is a conflict.
    pub fn create_task(&self, view: &dyn ExternalTask) -> Result<TaskRef> {
        let id = self.task_id(view);
        let mut task = self.with_unit_of_work(|uow| self.insert_task(uow, id, view))?;
        task.link(&self.inner.repositories);
        Ok(self.share(task))
    }

    /// Returns the task for an external task, creating and persisting it on
    /// first reference and re-syncing its summary otherwise.
    pub fn get_or_link_task(&self, view: &dyn ExternalTask) -> Result<TaskRef> {
        let id = self.task_id(view);
        if let Some(task_ref) = self.cached(&id) {
            self.synchronize(&task_ref, view)?;
            return Ok(task_ref);
        }
        let mut task = self.with_unit_of_work(|uow| match Tasks::new(uow.conn()).get(&id)? {
            Some(task) => Ok(task),
            None => self.insert_task(uow, id.clone(), view),
        })?;
        task.link(&self.inner.repositories);
        let task_ref = self.share(task);
        self.synchronize(&task_ref, view)?;
        Ok(task_ref)
    }

    /// Writes the task with all of its activities.
    pub fn persist_task(&self, task_ref: &TaskRef) -> Result<()> {
        let mut task = task_ref.lock();
        debug!("Persisting task {}", task.id);
        self.with_unit_of_work(|uow| {
            if let Some(project) = &task.project {
                Projects::new(uow.conn()).save(project)?;
            }
            Tasks::new(uow.conn()).save(&mut task)
        })
    }

    /// Deletes the task and everything it owns. Meant for cleanup tooling.
    pub fn delete_task(&self, task_ref: &TaskRef) -> Result<bool> {
        let task = task_ref.lock();
        let deleted = self.with_unit_of_work(|uow| Tasks::new(uow.conn()).delete(&task.id))?;
        self.inner.tasks.lock().remove(&task.id);
        Ok(deleted)
    }

    /// Applies `change` to the locked task and stores the result with `save`.
    /// If either step fails the task is restored.
    fn transition<R>(
        &self,
        task_ref: &TaskRef,
        change: impl FnOnce(&mut Task) -> Result<R>,
        save: impl FnOnce(&UnitOfWork, &mut Task, &mut R) -> Result<()>,
    ) -> Result<R> {
        let store = self.store()?;
        let mut task = task_ref.lock();
        let snapshot = task.clone();
        let mut outcome = match change(&mut *task) {
            Ok(outcome) => outcome,
            Err(e) => {
                *task = snapshot;
                return Err(e);
            }
        };
        match store.with_unit_of_work(|uow| save(uow, &mut *task, &mut outcome)) {
            Ok(()) => Ok(outcome),
            Err(e) => {
                *task = snapshot;
                Err(e)
            }
        }
    }

    /// Starts work on the task now. See [`Timekeeper::start_activity_at`].
    pub fn start_activity(&self, task_ref: &TaskRef) -> Result<Activity> {
        self.start_activity_at(task_ref, now())
    }

    /// Opens a new activity, or returns the one already running.
    pub fn start_activity_at(&self, task_ref: &TaskRef, at: NaiveDateTime) -> Result<Activity> {
        self.transition(
            task_ref,
            |task| {
                let (activity, created) = task.start_activity(at);
                Ok((activity.clone(), created))
            },
            |uow, task, outcome: &mut (Activity, bool)| {
                let (activity, created) = outcome;
                if !*created {
                    return Ok(());
                }
                if let Some(current) = task.current_activity_mut() {
                    Activities::new(uow.conn()).save(current)?;
                    *activity = current.clone();
                }
                debug!("Started activity {:?} on task {}", activity.id, task.id);
                Tasks::new(uow.conn()).set_current(task)
            },
        )
        .map(|(activity, _)| activity)
    }

    /// Ends the running activity at `at` and returns it, or `None` if the task
    /// was idle. With `reactivate` a new activity is opened at the same moment.
    ///
    /// Without `at` the activity ends now. A local clock that went back since
    /// the start (daylight saving) ends it at its start instead.
    pub fn end_activity(&self, task_ref: &TaskRef, at: Option<NaiveDateTime>, reactivate: bool) -> Result<Option<Activity>> {
        self.transition(
            task_ref,
            |task| {
                let at = at.unwrap_or_else(|| task.current_activity().map_or_else(now, |running| running.start.max(now())));
                let closed = task.end_activity(at)?;
                if closed.is_some() && reactivate {
                    task.start_activity(at);
                }
                Ok(closed)
            },
            |uow, task, closed: &mut Option<Activity>| {
                let Some(closed) = closed else {
                    return Ok(());
                };
                let activities = Activities::new(uow.conn());
                activities.save(closed)?;
                if let Some(current) = task.current_activity_mut() {
                    activities.save(current)?;
                }
                debug!("Ended activity {:?} on task {}", closed.id, task.id);
                Tasks::new(uow.conn()).set_current(task)
            },
        )
    }

    /// Ends an activity that was left open when the external task went
    /// inactive behind our back. `elapsed` reports how much real activity
    /// happened in a window. Does nothing while the external task is active.
    pub fn clean_up_task<F>(&self, task_ref: &TaskRef, view: &dyn ExternalTask, now: NaiveDateTime, elapsed: F) -> Result<Option<Activity>>
    where
        F: FnMut(NaiveDateTime, NaiveDateTime) -> Duration,
    {
        if view.is_active() {
            return Ok(None);
        }
        self.transition(
            task_ref,
            |task| task.clean_up(now, elapsed),
            |uow, task, closed: &mut Option<Activity>| {
                let Some(closed) = closed else {
                    return Ok(());
                };
                Activities::new(uow.conn()).save(closed)?;
                debug!("Cleaned up activity {:?} on task {}", closed.id, task.id);
                Tasks::new(uow.conn()).set_current(task)
            },
        )
    }

    /// Sets label and comment of one of the task's activities. A label not in
    /// the catalog yet is added to it.
    pub fn annotate_activity(&self, task_ref: &TaskRef, activity_id: i64, label: Option<String>, comment: Option<String>) -> Result<Activity> {
        self.transition(
            task_ref,
            |task| {
                let activity = task.activity_mut(activity_id).ok_or(Error::ActivityNotFound(activity_id))?;
                activity.label = label;
                activity.comment = comment;
                Ok(activity.clone())
            },
            |uow, task, annotated: &mut Activity| {
                if let Some(name) = &annotated.label {
                    let labels = Labels::new(uow.conn());
                    if labels.get(name)?.is_none() {
                        labels.save(&ActivityLabel::new(name.clone(), None))?;
                    }
                }
                let activity = task.activity_mut(activity_id).ok_or(Error::ActivityNotFound(activity_id))?;
                Activities::new(uow.conn()).save(activity)
            },
        )
    }

    pub fn list_all_tasks(&self) -> Result<Vec<TaskRef>> {
        let tasks = self.with_unit_of_work(|uow| Tasks::new(uow.conn()).list())?;
        Ok(self.share_all(tasks))
    }

    /// Tasks with any recorded time in the seven days from `start`.
    pub fn list_tasks_active_in_week(&self, start: NaiveDate) -> Result<Vec<TaskRef>> {
        self.list_tasks_active_in_week_at(start, now())
    }

    pub fn list_tasks_active_in_week_at(&self, start: NaiveDate, now: NaiveDateTime) -> Result<Vec<TaskRef>> {
        let from = start.and_time(NaiveTime::MIN);
        let to = from + Duration::days(7);
        let tasks = self.with_unit_of_work(|uow| Tasks::new(uow.conn()).list_touching(from, to))?;
        Ok(self
            .share_all(tasks)
            .into_iter()
            .filter(|task| task.lock().has_activity_in_week(start, now))
            .collect())
    }

    pub fn duration_on(&self, task_ref: &TaskRef, date: NaiveDate) -> Duration {
        task_ref.lock().duration_on(date, now())
    }

    pub fn link_status(&self, task_ref: &TaskRef) -> TaskLinkStatus {
        task_ref.lock().link(&self.inner.repositories)
    }

    pub fn get_project(&self, title: &str) -> Result<Option<Project>> {
        self.store()?.find::<Project>(title)
    }

    /// Creates a project of the given kind. A taken title is a conflict.
    pub fn create_project(&self, title: &str, kind: &str) -> Result<Project> {
        self.with_unit_of_work(|uow| {
            let projects = Projects::new(uow.conn());
            let project = Project::new(projects.get_or_create_type(kind)?, title);
            projects.create(&project)?;
            info!("Created project '{}' of type '{}'", title, kind);
            Ok(project)
        })
    }

    pub fn tasks_in_project(&self, title: &str) -> Result<Vec<TaskRef>> {
        let tasks = self.with_unit_of_work(|uow| Tasks::new(uow.conn()).list_by_project(title))?;
        Ok(self.share_all(tasks))
    }

    /// Adds the label or updates its color.
    pub fn set_label(&self, label: &ActivityLabel) -> Result<()> {
        self.store()?.persist(&mut label.clone())
    }

    /// Deletes the label and clears it from every activity using it.
    pub fn remove_label(&self, name: &str) -> Result<bool> {
        let removed = self.with_unit_of_work(|uow| Labels::new(uow.conn()).delete(name))?;
        let tasks: Vec<TaskRef> = self.inner.tasks.lock().values().cloned().collect();
        for task_ref in tasks {
            let mut task = task_ref.lock();
            for activity in task.activities_mut() {
                if activity.label.as_deref() == Some(name) {
                    activity.label = None;
                }
            }
        }
        Ok(removed)
    }

    pub fn list_labels(&self) -> Result<Vec<ActivityLabel>> {
        self.store()?.query::<ActivityLabel>()
    }

    /// Dumps tasks, activities and their links into `dir` as one consistent
    /// snapshot. Returns the number of rows written.
    pub fn export_to(&self, dir: &Path) -> Result<usize> {
        let rows = self.with_unit_of_work(|uow| Exporter::new(uow.conn()).export(dir))?;
        info!("Exported {} rows to {}", rows, dir.display());
        Ok(rows)
    }

    /// Merges an earlier export back in, all or nothing, then reloads every
    /// cached task. Returns the number of rows read.
    pub fn import_from(&self, dir: &Path) -> Result<usize> {
        let store = self.store()?;
        Importer::check_inputs(dir)?;
        let rows = store.with_unit_of_work(|uow| Importer::new(uow.conn()).import(dir))?;
        info!("Imported {} rows from {}", rows, dir.display());

        let cached: Vec<TaskRef> = self.inner.tasks.lock().values().cloned().collect();
        for task_ref in cached {
            let mut task = task_ref.lock();
            match store.with_unit_of_work(|uow| Tasks::new(uow.conn()).get(&task.id)) {
                Ok(Some(mut fresh)) => {
                    fresh.link_status = task.link_status;
                    *task = fresh;
                }
                Ok(None) => {}
                // The import is already committed.
                Err(e) => warn!("Could not reload task {} after import: {}", task.id, e),
            }
        }
        self.inner.listeners.notify(StoreEvent::Imported);
        Ok(rows)
    }

    /// Disposes the calling worker's unit of work now rather than when its
    /// thread exits.
    pub fn release_worker(&self) {
        if let Some(store) = self.inner.store.get() {
            store.release_worker();
        }
    }

    /// Stops the service. Further requests fail with [`Error::Closed`].
    pub fn close(&self) {
        let closed = self.inner.state.send_if_modified(|state| {
            if *state == ServiceState::Closed {
                false
            } else {
                *state = ServiceState::Closed;
                true
            }
        });
        if !closed {
            return;
        }
        if let Some(store) = self.inner.store.get() {
            store.close();
        }
        self.inner.tasks.lock().clear();
        self.inner.listeners.notify(StoreEvent::Closed);
        self.inner.listeners.clear();
        info!("Timekeeper service closed");
    }
}
