//! Units of work and the typed store primitives built on them.
//!
//! Every worker thread gets its own [`UnitOfWork`]: one SQLite connection that
//! is opened on first use and reused until the worker is released or its
//! thread exits. Calls to
//! [`SessionManager::with_unit_of_work`] nest. The outermost call opens the
//! transaction and owns its commit or rollback, inner calls join it.
//!
//! ```rust,no_run
//! use timekeeper::db::{db::Db, session::SessionManager};
//! use timekeeper::libs::label::ActivityLabel;
//! use std::time::Duration;
//!
//! let sessions = SessionManager::new(Db::new("timekeeper.db", Duration::from_secs(5)));
//! let mut label = ActivityLabel::new("review", None);
//! sessions.persist(&mut label)?;
//! let labels: Vec<ActivityLabel> = sessions.query()?;
//! # Ok::<(), timekeeper::libs::error::Error>(())
//! ```

use super::db::Db;
use crate::libs::error::{Error, Result};
use parking_lot::{Mutex, ReentrantMutex};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// A worker's session with the store.
pub struct UnitOfWork {
    conn: Connection,
    depth: Cell<u32>,
    rollback_only: Cell<bool>,
}

impl UnitOfWork {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            depth: Cell::new(0),
            rollback_only: Cell::new(false),
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        self.depth.get() > 0
    }

    /// Makes the outermost caller roll back even if it finishes normally.
    pub fn set_rollback_only(&self) {
        self.rollback_only.set(true);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.get()
    }
}

/// One level of [`SessionManager::with_unit_of_work`]. Dropping a scope that
/// was never finished (the work panicked) rolls the transaction back.
struct Scope<'a> {
    uow: &'a UnitOfWork,
    outermost: bool,
    finished: bool,
}

impl<'a> Scope<'a> {
    fn enter(uow: &'a UnitOfWork) -> Result<Self> {
        let outermost = uow.depth.get() == 0;
        if outermost {
            uow.conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| Error::from(e).in_transaction())?;
            uow.rollback_only.set(false);
        }
        uow.depth.set(uow.depth.get() + 1);
        Ok(Self {
            uow,
            outermost,
            finished: false,
        })
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        self.finished = true;
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.uow.set_rollback_only();
                if self.outermost {
                    self.rollback();
                }
                return Err(e.in_transaction());
            }
        };
        if !self.outermost {
            return Ok(value);
        }
        if self.uow.is_rollback_only() {
            self.rollback();
            return Err(Error::RollbackOnly.in_transaction());
        }
        if let Err(e) = self.uow.conn.execute_batch("COMMIT") {
            self.rollback();
            return Err(Error::from(e).in_transaction());
        }
        Ok(value)
    }

    fn rollback(&self) {
        if let Err(e) = self.uow.conn.execute_batch("ROLLBACK") {
            warn!("Rollback failed: {}", e);
        }
        self.uow.rollback_only.set(false);
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.uow.depth.set(self.uow.depth.get() - 1);
        if self.outermost && !self.finished {
            self.rollback();
        }
    }
}

/// Something stored in its own table and addressable by key.
pub trait Entity: Sized {
    type Key: ?Sized;

    fn find(uow: &UnitOfWork, key: &Self::Key) -> Result<Option<Self>>;

    fn find_all(uow: &UnitOfWork) -> Result<Vec<Self>>;

    /// Inserts or updates the row, filling in generated ids.
    fn persist(&mut self, uow: &UnitOfWork) -> Result<()>;

    fn delete(&self, uow: &UnitOfWork) -> Result<()>;
}

type Session = Arc<ReentrantMutex<UnitOfWork>>;
type SessionMap = Mutex<HashMap<ThreadId, Session>>;

/// Per-thread record of the managers holding a session for this thread.
/// Dropped when the thread exits, taking those sessions with it.
struct WorkerExit {
    thread: ThreadId,
    managers: Vec<Weak<SessionMap>>,
}

impl WorkerExit {
    fn new() -> Self {
        Self {
            thread: thread::current().id(),
            managers: Vec::new(),
        }
    }

    fn watch(&mut self, sessions: &Arc<SessionMap>) {
        self.managers.retain(|m| m.strong_count() > 0);
        if !self.managers.iter().any(|m| m.as_ptr() == Arc::as_ptr(sessions)) {
            self.managers.push(Arc::downgrade(sessions));
        }
    }
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        for sessions in self.managers.drain(..).filter_map(|m| m.upgrade()) {
            sessions.lock().remove(&self.thread);
        }
    }
}

thread_local! {
    static WORKER_EXIT: RefCell<WorkerExit> = RefCell::new(WorkerExit::new());
}

/// Hands out one unit of work per worker thread.
pub struct SessionManager {
    db: Db,
    sessions: Arc<SessionMap>,
}

impl SessionManager {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    fn session(&self) -> Result<Session> {
        let id = thread::current().id();
        if let Some(session) = self.sessions.lock().get(&id) {
            return Ok(session.clone());
        }
        // Connect outside the map lock, other workers need not wait for us.
        let conn = self.db.connect()?;
        debug!("Opened unit of work for {:?}", id);
        let session = Arc::new(ReentrantMutex::new(UnitOfWork::new(conn)));
        let session = self.sessions.lock().entry(id).or_insert(session).clone();
        // Fails only while the thread is already exiting.
        let _ = WORKER_EXIT.try_with(|exit| exit.borrow_mut().watch(&self.sessions));
        Ok(session)
    }

    /// Runs `work` inside the calling worker's transaction.
    ///
    /// Starts a transaction when none is open and commits it when `work`
    /// returns `Ok`. Failures roll back and come back as
    /// [`Error::TransactionFailure`]. When called from inside another unit of
    /// work, `work` joins the open transaction and leaves the boundary to the
    /// outermost caller.
    pub fn with_unit_of_work<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork) -> Result<T>,
    {
        let session = self.session()?;
        let guard = session.lock();
        let uow: &UnitOfWork = &guard;
        let scope = Scope::enter(uow)?;
        let result = work(uow);
        scope.finish(result)
    }

    pub fn find<E: Entity>(&self, key: &E::Key) -> Result<Option<E>> {
        self.with_unit_of_work(|uow| E::find(uow, key))
    }

    pub fn query<E: Entity>(&self) -> Result<Vec<E>> {
        self.with_unit_of_work(|uow| E::find_all(uow))
    }

    pub fn persist<E: Entity>(&self, entity: &mut E) -> Result<()> {
        self.with_unit_of_work(|uow| entity.persist(uow))
    }

    pub fn delete<E: Entity>(&self, entity: &E) -> Result<()> {
        self.with_unit_of_work(|uow| entity.delete(uow))
    }

    /// Disposes the calling worker's unit of work, closing its connection.
    pub fn release_worker(&self) {
        if self.sessions.lock().remove(&thread::current().id()).is_some() {
            debug!("Released unit of work for {:?}", thread::current().id());
        }
    }

    pub fn close(&self) {
        let released = self.sessions.lock().drain().count();
        debug!("Released {} units of work", released);
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> SessionManager {
        let sessions = SessionManager::new(Db::new(dir.path().join("t.db"), Duration::from_secs(5)));
        sessions
            .with_unit_of_work(|uow| Ok(uow.conn().execute_batch("CREATE TABLE t (v INTEGER PRIMARY KEY)")?))
            .unwrap();
        sessions
    }

    fn count(sessions: &SessionManager) -> i64 {
        sessions
            .with_unit_of_work(|uow| Ok(uow.conn().query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn nested_calls_join_outer_transaction() {
        let dir = TempDir::new().unwrap();
        let sessions = manager(&dir);
        let result: Result<()> = sessions.with_unit_of_work(|uow| {
            uow.conn().execute("INSERT INTO t VALUES (1)", [])?;
            sessions.with_unit_of_work(|inner| {
                assert!(inner.in_transaction());
                inner.conn().execute("INSERT INTO t VALUES (2)", [])?;
                Ok(())
            })?;
            Err(Error::RollbackOnly)
        });
        assert!(matches!(result, Err(Error::TransactionFailure(_))));
        assert_eq!(count(&sessions), 0);
    }

    #[test]
    fn swallowed_inner_failure_still_rolls_back() {
        let dir = TempDir::new().unwrap();
        let sessions = manager(&dir);
        let result = sessions.with_unit_of_work(|uow| {
            uow.conn().execute("INSERT INTO t VALUES (1)", [])?;
            let inner: Result<()> = sessions.with_unit_of_work(|_| Err(Error::NotReady));
            assert!(inner.is_err());
            Ok(())
        });
        assert!(matches!(result.unwrap_err().cause(), Error::RollbackOnly));
        assert_eq!(count(&sessions), 0);
    }

    #[test]
    fn failure_is_wrapped_once() {
        let dir = TempDir::new().unwrap();
        let sessions = manager(&dir);
        let err = sessions
            .with_unit_of_work(|_| sessions.with_unit_of_work::<(), _>(|_| Err(Error::NotReady)))
            .unwrap_err();
        match err {
            Error::TransactionFailure(inner) => assert!(matches!(*inner, Error::NotReady)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn panic_rolls_back_and_session_stays_usable() {
        let dir = TempDir::new().unwrap();
        let sessions = manager(&dir);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = sessions.with_unit_of_work::<(), _>(|uow| {
                uow.conn().execute("INSERT INTO t VALUES (1)", [])?;
                panic!("boom");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(count(&sessions), 0);
    }

    #[test]
    fn each_worker_gets_its_own_session() {
        let dir = TempDir::new().unwrap();
        let sessions = Arc::new(manager(&dir));
        let worker = {
            let sessions = sessions.clone();
            thread::spawn(move || {
                sessions.with_unit_of_work(|uow| Ok(uow.conn().execute("INSERT INTO t VALUES (7)", [])?)).unwrap();
                sessions.open_sessions()
            })
        };
        assert_eq!(worker.join().unwrap(), 2);
        assert_eq!(count(&sessions), 1);
        assert_eq!(sessions.open_sessions(), 1);
        sessions.release_worker();
        assert_eq!(sessions.open_sessions(), 0);
        assert_eq!(count(&sessions), 1);
        sessions.close();
        assert_eq!(sessions.open_sessions(), 0);
    }

    #[test]
    fn exited_workers_dispose_their_sessions() {
        let dir = TempDir::new().unwrap();
        let sessions = Arc::new(manager(&dir));
        let workers: Vec<_> = (0..5)
            .map(|i| {
                let sessions = sessions.clone();
                thread::spawn(move || {
                    sessions.with_unit_of_work(|uow| Ok(uow.conn().execute("INSERT INTO t VALUES (?1)", [i])?)).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        // only the test thread's own session is left
        assert_eq!(sessions.open_sessions(), 1);
        assert_eq!(count(&sessions), 5);
    }

    #[test]
    fn worker_outliving_its_manager_exits_cleanly() {
        let dir = TempDir::new().unwrap();
        let sessions = manager(&dir);
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let worker = {
            let sessions = Arc::new(sessions);
            let worker_sessions = sessions.clone();
            let handle = thread::spawn(move || {
                worker_sessions.with_unit_of_work(|uow| Ok(uow.conn().execute("INSERT INTO t VALUES (1)", [])?)).unwrap();
                drop(worker_sessions);
                rx.recv().unwrap();
            });
            drop(sessions);
            handle
        };
        tx.send(()).unwrap();
        worker.join().unwrap();
    }
}
