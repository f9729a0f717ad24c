pub mod changelog;
pub mod cycle_time;
pub mod load_type;
pub mod median;
pub mod status_days;
pub mod story_points;
pub mod types;

pub use types::*;

use chrono::{DateTime, Utc};

use crate::config::Config;

/// Build the three output tables from full extracts. Order matters: story
/// points feed the detailed table, which feeds both summaries.
///
/// `now` stands in for the completion time of open issues and anchors the
/// median window, so identical inputs and `now` give identical tables.
pub fn create_tables(
    mut issues: Vec<Issue>,
    raw_events: Vec<RawStatusEvent>,
    config: &Config,
    now: DateTime<Utc>,
) -> Tables {
    story_points::assign_story_points(&mut issues);

    let events = changelog::annotate(raw_events);
    let days = status_days::status_days(&events, &config.tracked_statuses);
    let detailed = cycle_time::issues_with_times(
        &issues,
        &events,
        &days,
        &config.teams,
        &config.backlog_status,
        now,
    );
    log::info!(
        "Computed metrics for {} rows from {} issue rows and {} status changes",
        detailed.len(),
        issues.len(),
        events.len()
    );

    let median = median::median_by_team_and_type(
        &detailed,
        &config.in_progress_column,
        config.median_window_days,
        now,
    );
    let sales_efficiency = load_type::sales_efficiency(&detailed, config);
    log::info!(
        "Summarised {} (team, type) medians and {} sales load buckets",
        median.len(),
        sales_efficiency.len()
    );

    Tables {
        detailed,
        median,
        sales_efficiency,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

    use super::types::{Issue, IssueMetrics, RawStatusEvent};
    use crate::date_util::year_week_key;

    pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    pub fn issue(key: &str, issue_type: &str, component: Option<&str>) -> Issue {
        Issue {
            key: key.to_string(),
            epic: None,
            epic_name: None,
            issue_type: issue_type.to_string(),
            assignee: None,
            reporter: None,
            component: component.map(String::from),
            status: "Done".to_string(),
            sprints: vec![],
            labels: vec![],
            created: None,
            done: None,
            story_points: None,
        }
    }

    pub fn raw_event(
        key: &str,
        from: &str,
        to: &str,
        created: Option<DateTime<Utc>>,
    ) -> RawStatusEvent {
        RawStatusEvent {
            key: key.to_string(),
            from_status: Some(from.to_string()),
            to_status: Some(to.to_string()),
            created,
        }
    }

    pub fn metrics_row(
        key: &str,
        issue_type: &str,
        team: Option<&str>,
        created: Option<NaiveDate>,
    ) -> IssueMetrics {
        IssueMetrics {
            key: key.to_string(),
            epic: None,
            epic_name: None,
            issue_type: issue_type.to_string(),
            assignee: None,
            reporter: None,
            component: None,
            team: team.map(String::from),
            status: "Done".to_string(),
            created,
            done: None,
            week_created: created.map(|d| d.iso_week().week()),
            month_created: created.map(|d| d.month()),
            year_created: created.map(|d| d.year()),
            year_week_created: created.map(year_week_key),
            story_points: None,
            ct_days: None,
            lt_days: None,
            status_days: Default::default(),
        }
    }
}
