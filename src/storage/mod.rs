pub mod extract;
pub mod load;

use std::path::Path;

use rusqlite_migration::{Migrations, M};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::{Issue, RawStatusEvent, SprintIssue};

/// Read-only handle on the tracker mirror the metrics are computed from.
#[derive(Clone)]
pub struct Source {
    conn: tokio_rusqlite::Connection,
}

impl Source {
    /// Open the source database at the default path (`~/.devmetrics/jira.db`).
    pub async fn open() -> Result<Self> {
        Self::open_at(Config::default_dir()?.join("jira.db")).await
    }

    /// Open an existing source database. Writes are refused for the lifetime
    /// of the connection.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::Config(format!(
                "source database not found: {}",
                path.display()
            )));
        }
        let conn = tokio_rusqlite::Connection::open(&path).await?;
        conn.call(|conn| {
            conn.execute_batch("PRAGMA query_only=ON; PRAGMA busy_timeout=5000;")?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Open an empty, writable in-memory source (for testing).
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Issues of a project, one row per component.
    pub async fn issues(&self, project: &str) -> Result<Vec<Issue>> {
        let project = project.to_string();
        let issues = self
            .conn
            .call(move |conn| extract::extract_issues(conn, &project))
            .await
            .map_err(|e| Error::Extract(e.to_string()))?;
        log::info!("Extracted {} rows from issues table", issues.len());
        Ok(issues)
    }

    /// Status changes of a project's issues.
    pub async fn changelog(&self, project: &str) -> Result<Vec<RawStatusEvent>> {
        let project = project.to_string();
        let events = self
            .conn
            .call(move |conn| extract::extract_changelog(conn, &project))
            .await
            .map_err(|e| Error::Extract(e.to_string()))?;
        log::info!("Extracted {} rows from changelog table", events.len());
        Ok(events)
    }

    /// Issues planned in a sprint.
    pub async fn sprint(&self, project: &str, sprint: &str) -> Result<Vec<SprintIssue>> {
        let project = project.to_string();
        let sprint = sprint.to_string();
        self.conn
            .call(move |conn| extract::extract_sprint(conn, &project, &sprint))
            .await
            .map_err(|e| Error::Extract(e.to_string()))
    }
}

/// Warehouse wraps two `tokio_rusqlite::Connection` instances (writer + reader)
/// using WAL mode, so `status` can read while a load is running.
#[derive(Clone)]
pub struct Warehouse {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Warehouse {
    /// Open the warehouse at the default path (`~/.devmetrics/warehouse.db`).
    pub async fn open() -> Result<Self> {
        let dir = Config::default_dir()?;
        std::fs::create_dir_all(&dir)?;
        Self::open_at(dir.join("warehouse.db")).await
    }

    /// Open (or create) the warehouse at the given path.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_reader(&reader).await?;

        Ok(Self { writer, reader })
    }

    /// Open an in-memory warehouse (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // In-memory DBs are per-connection, so reader and writer share one.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations = Migrations::new(vec![M::up(include_str!(
                "migrations/001_load_runs.sql"
            ))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Replace each table wholesale and record the load under `run_id`.
    pub async fn load(
        &self,
        tables: Vec<load::Table>,
        run_id: &str,
    ) -> Result<Vec<load::LoadReport>> {
        let run_id = run_id.to_string();
        let reports = self
            .writer
            .call(move |conn| {
                let mut reports = Vec::with_capacity(tables.len());
                for table in &tables {
                    reports.push(load::replace_table(conn, table, &run_id)?);
                }
                Ok::<_, rusqlite::Error>(reports)
            })
            .await?;
        for report in &reports {
            log::info!("Uploaded {} rows to {} table", report.rows, report.table);
        }
        Ok(reports)
    }

    /// Most recent loads, newest first.
    pub async fn recent_loads(&self, limit: u32) -> Result<Vec<load::LoadRun>> {
        Ok(self
            .reader
            .call(move |conn| load::recent_loads(conn, limit))
            .await?)
    }
}
