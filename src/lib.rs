pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{IssueMetrics, LoadBucket, MedianRow, SprintIssue, Tables};
pub use storage::load::{LoadReport, LoadRun};
pub use storage::{Source, Warehouse};

use chrono::{DateTime, Utc};

/// Main entry point: extracts a project from the tracker mirror and computes
/// its metric tables.
pub struct DevMetrics {
    source: Source,
    config: Config,
}

impl DevMetrics {
    pub fn new(source: Source, config: Config) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract everything for the configured project and build the detailed,
    /// median and sales load tables. `now` closes open issues.
    pub async fn create_tables(&self, now: DateTime<Utc>) -> Result<Tables> {
        let issues = self.source.issues(&self.config.project).await?;
        let events = self.source.changelog(&self.config.project).await?;
        Ok(metrics::create_tables(issues, events, &self.config, now))
    }

    /// Full run: compute all tables and replace them in the warehouse.
    pub async fn run(&self, warehouse: &Warehouse, now: DateTime<Utc>) -> Result<Vec<LoadReport>> {
        let tables = self.create_tables(now).await?;
        let run_id = now.to_rfc3339();
        warehouse
            .load(storage::load::warehouse_tables(&tables, &self.config), &run_id)
            .await
    }

    /// Issues planned in a sprint of the configured project.
    pub async fn sprint(&self, sprint: &str) -> Result<Vec<SprintIssue>> {
        self.source.sprint(&self.config.project, sprint).await
    }
}
