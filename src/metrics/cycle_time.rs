use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};

use super::status_days::StatusDays;
use super::types::{Issue, IssueMetrics, StatusEvent};
use crate::date_util::{days_between, round_to, year_week_key};

/// Join issues with their status history and derive cycle and lead time.
///
/// - cycle time runs from the issue's first exit from `backlog_status` to
///   completion (or `now`); `None` if it never left the backlog.
/// - lead time runs from creation to completion (or `now`).
///
/// Event and list columns are dropped and timestamps truncated to dates, so
/// the per-event join collapses back to one row per (issue, component).
/// Status durations are attached last, by issue key.
pub fn issues_with_times(
    issues: &[Issue],
    events: &[StatusEvent],
    status_days: &StatusDays,
    teams: &BTreeMap<String, String>,
    backlog_status: &str,
    now: DateTime<Utc>,
) -> Vec<IssueMetrics> {
    let cycle_starts = cycle_starts(events, backlog_status);

    let mut seen = HashSet::new();
    let mut rows: Vec<IssueMetrics> = issues
        .iter()
        .map(|issue| metrics_row(issue, cycle_starts.get(issue.key.as_str()).copied(), teams, now))
        .filter(|row| seen.insert(row.clone()))
        .collect();

    for row in &mut rows {
        if let Some(days) = status_days.get(&row.key) {
            row.status_days = days.clone();
        }
    }
    rows
}

/// Timestamp of each issue's first exit from the backlog (rank 1).
fn cycle_starts<'a>(
    events: &'a [StatusEvent],
    backlog_status: &str,
) -> HashMap<&'a str, DateTime<Utc>> {
    let mut starts = HashMap::new();
    for event in events {
        if event.rank != 1 || event.from_status.as_deref() != Some(backlog_status) {
            continue;
        }
        if let Some(ts) = event.created {
            starts
                .entry(event.key.as_str())
                .and_modify(|start: &mut DateTime<Utc>| *start = (*start).min(ts))
                .or_insert(ts);
        }
    }
    starts
}

fn metrics_row(
    issue: &Issue,
    cycle_start: Option<DateTime<Utc>>,
    teams: &BTreeMap<String, String>,
    now: DateTime<Utc>,
) -> IssueMetrics {
    let done_or_now = issue.done.unwrap_or(now);
    let ct_days = cycle_start.map(|start| round_to(days_between(start, done_or_now), 2));
    let lt_days = issue
        .created
        .map(|created| round_to(days_between(created, done_or_now), 2));

    let created = issue.created.map(|ts| ts.date_naive());
    let team = issue
        .component
        .as_ref()
        .and_then(|c| teams.get(c))
        .cloned();

    IssueMetrics {
        key: issue.key.clone(),
        epic: issue.epic.clone(),
        epic_name: issue.epic_name.clone(),
        issue_type: issue.issue_type.clone(),
        assignee: issue.assignee.clone(),
        reporter: issue.reporter.clone(),
        component: issue.component.clone(),
        team,
        status: issue.status.clone(),
        created,
        done: issue.done.map(|ts| ts.date_naive()),
        week_created: created.map(|d| d.iso_week().week()),
        month_created: created.map(|d| d.month()),
        year_created: created.map(|d| d.year()),
        year_week_created: created.map(year_week_key),
        story_points: issue.story_points,
        ct_days,
        lt_days,
        status_days: BTreeMap::new(),
    }
}
