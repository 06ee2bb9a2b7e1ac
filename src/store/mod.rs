//! SQLite persistence for readings and alert events.
//!
//! A single connection lives on a dedicated worker thread. Callers hand it
//! closures over a channel and await the result, so the store handle is
//! cheap to clone and safe to share across request handlers.

mod events;
mod migrations;
pub mod models;
mod readings;

pub use models::{
    AlertEvent, NewAlert, Reading, ReadingQuery, StoreSummary, DEFAULT_SITE, PM25_ALERT,
};

use chrono::{DateTime, SecondsFormat, Utc};
use crossbeam_channel::{unbounded, Sender};
use rusqlite::Connection;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(e) = self.sender.send(StoreCommand::Shutdown) {
                tracing::error!("Failed to send shutdown to store thread: {}", e);
            }
            if handle.join().is_err() {
                tracing::error!("Store thread panicked during shutdown");
            }
        }
    }
}

/// Handle to the reading/event database.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
    path: Arc<PathBuf>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let open_path = path.clone();
        let store = Self::spawn(path.clone(), move || Connection::open(&open_path))?;
        tracing::info!("Store opened at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::spawn(PathBuf::from(":memory:"), Connection::open_in_memory)
    }

    fn spawn<F>(path: PathBuf, opener: F) -> Result<Self, StoreError>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = unbounded::<StoreCommand>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), StoreError>>(1);

        let worker = thread::Builder::new()
            .name("iaq-store".into())
            .spawn(move || {
                let mut conn = match opener() {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StoreError::Sqlite(e)));
                        return;
                    }
                };

                // Journal mode is a no-op for in-memory databases.
                if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                    tracing::warn!("Failed to enable WAL mode: {}", e);
                }

                let init = migrations::run_migrations(&mut conn);
                if ready_tx.send(init).is_err() {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&mut conn),
                        StoreCommand::Shutdown => break,
                    }
                }

                tracing::debug!("Store thread shutting down");
            })?;

        ready_rx.recv().map_err(|_| StoreError::WorkerGone)??;

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            path: Arc::new(path),
        })
    }

    /// Location of the database (`:memory:` for in-memory stores).
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Run `task` against the connection on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                tracing::debug!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| StoreError::WorkerGone)?;

        reply_rx.await.map_err(|_| StoreError::WorkerGone)?
    }
}

/// Canonical stored timestamp: fixed-width RFC 3339 UTC with microseconds,
/// so lexical order in SQL equals chronological order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

/// Store errors.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    Migration(String),
    InvalidValue(String),
    /// The worker thread is no longer running
    WorkerGone,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "Database error: {e}"),
            StoreError::Io(e) => write!(f, "IO error: {e}"),
            StoreError::Migration(e) => write!(f, "Migration error: {e}"),
            StoreError::InvalidValue(e) => write!(f, "Invalid stored value: {e}"),
            StoreError::WorkerGone => write!(f, "Store worker is not running"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(e) => Some(e),
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}
