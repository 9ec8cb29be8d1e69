use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// A closure run on the worker thread: a reading insert, an asset upsert, a
/// consumption write plus its history row, or a window query.
type WorkerTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerCommand {
    Execute(WorkerTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<WorkerCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(WorkerCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the tank database. A dedicated worker thread owns the SQLite
/// connection, so concurrent batch tasks queue their reads and consumption
/// writes onto it instead of sharing a connection.
///
/// Cloning is cheap; every clone talks to the same worker.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let database = Self::spawn(db_path, move || Connection::open(&path_for_thread))?;

        info!(
            "Database initialized at {}",
            database.path().display()
        );

        Ok(database)
    }

    /// Private database that disappears with the last handle. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn(PathBuf::from(":memory:"), Connection::open_in_memory)
    }

    fn spawn<F>(db_path: PathBuf, open: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("tankwatch-db".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        WorkerCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        WorkerCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = WorkerCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AssetRecord, Reading};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[tokio::test]
    async fn clones_share_one_worker() {
        let db = Database::open_in_memory().unwrap();
        let writer = db.clone();
        writer
            .upsert_asset(&AssetRecord::new("tank-a", "Depot", 50.0))
            .await
            .unwrap();

        let asset = db.get_asset("tank-a").await.unwrap();

        assert_eq!(asset.map(|a| a.name), Some("Depot".to_string()));
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("tankwatch-db-{}", Uuid::new_v4()));
        let path = dir.join("tanks.sqlite3");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
        {
            let db = Database::new(path.clone()).unwrap();
            assert_eq!(db.path(), path.as_path());
            db.upsert_asset(&AssetRecord::new("tank-a", "Depot", 50.0))
                .await
                .unwrap();
            db.insert_reading("tank-a", &Reading::percent(at, 50.0))
                .await
                .unwrap();
        }

        let reopened = Database::new(path.clone()).unwrap();
        let readings = reopened.get_readings_since("tank-a", at).await.unwrap();
        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(readings, vec![Reading::percent(at, 50.0)]);
    }
}
