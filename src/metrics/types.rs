use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// An issue as extracted from the tracker: one row per component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub key: String,
    pub epic: Option<String>,
    pub epic_name: Option<String>,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub component: Option<String>,
    pub status: String,
    pub sprints: Vec<String>,
    pub labels: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
    pub story_points: Option<u8>,
}

/// A status change as extracted, before per-issue ordering is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatusEvent {
    pub key: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// A status change placed in its issue's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub key: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// 1-based position among this issue's events leaving `from_status`.
    /// Events with equal timestamps share a rank.
    pub rank: u32,
    /// When `to_status` was left, i.e. the next event's timestamp.
    /// `None` while the issue is still in `to_status`.
    pub status_ended: Option<DateTime<Utc>>,
}

/// Detailed metrics row: one per (issue, component).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueMetrics {
    pub key: String,
    pub epic: Option<String>,
    pub epic_name: Option<String>,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub component: Option<String>,
    pub team: Option<String>,
    pub status: String,
    pub created: Option<NaiveDate>,
    pub done: Option<NaiveDate>,
    pub week_created: Option<u32>,
    pub month_created: Option<u32>,
    pub year_created: Option<i32>,
    pub year_week_created: Option<String>,
    pub story_points: Option<u8>,
    pub ct_days: Option<f64>,
    pub lt_days: Option<f64>,
    /// Days per tracked status column. A missing column means unknown, not zero.
    #[serde(flatten)]
    pub status_days: BTreeMap<String, f64>,
}

impl IssueMetrics {
    pub fn status_day(&self, column: &str) -> Option<f64> {
        self.status_days.get(column).copied()
    }
}

// Rows are deduplicated exactly, floats compared bit for bit.
impl Eq for IssueMetrics {}

impl Hash for IssueMetrics {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.epic.hash(state);
        self.epic_name.hash(state);
        self.issue_type.hash(state);
        self.assignee.hash(state);
        self.reporter.hash(state);
        self.component.hash(state);
        self.team.hash(state);
        self.status.hash(state);
        self.created.hash(state);
        self.done.hash(state);
        self.week_created.hash(state);
        self.month_created.hash(state);
        self.year_created.hash(state);
        self.year_week_created.hash(state);
        self.story_points.hash(state);
        self.ct_days.map(f64::to_bits).hash(state);
        self.lt_days.map(f64::to_bits).hash(state);
        for (column, days) in &self.status_days {
            column.hash(state);
            days.to_bits().hash(state);
        }
    }
}

/// Rolling medians for one (team, issue type).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedianRow {
    pub team: String,
    pub issue_type: String,
    pub ct_days: Option<f64>,
    pub lt_days: Option<f64>,
    pub in_progress_days: Option<f64>,
}

/// A sales issue's effort attributed to one load type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRow {
    pub key: String,
    pub epic: Option<String>,
    pub issue_type: String,
    pub year_created: Option<i32>,
    pub month_created: Option<u32>,
    pub team: String,
    pub in_progress_days: Option<f64>,
    pub load_type: String,
}

/// Summed effort of one load type in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBucket {
    pub year: i32,
    pub month: u32,
    pub load_type: String,
    pub in_progress_days: f64,
    pub in_progress_days_month: f64,
    /// Share of the month's total, `None` when the month's total is zero.
    pub percentage: Option<f64>,
}

/// The three output tables of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tables {
    pub detailed: Vec<IssueMetrics>,
    pub median: Vec<MedianRow>,
    pub sales_efficiency: Vec<LoadBucket>,
}

/// An issue in a sprint, for the sprint listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintIssue {
    pub key: String,
    pub status: String,
    pub done: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub component: Option<String>,
    pub story_points: Option<u8>,
}
