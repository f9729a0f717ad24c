use std::collections::{BTreeMap, HashMap};

use super::types::StatusEvent;
use crate::config::TrackedStatus;
use crate::date_util::{days_between, round_to};

/// Cumulative days per tracked status, keyed by issue then column name.
pub type StatusDays = HashMap<String, BTreeMap<String, f64>>;

/// Sum the time each issue spent in each tracked status.
///
/// A visit lasts from its event to the issue's next event, rounded to four
/// decimals; revisits add up. A visit with an unknown end (the issue is still
/// there) adds nothing, so a status with no completed visit has no entry.
pub fn status_days(events: &[StatusEvent], tracked: &[TrackedStatus]) -> StatusDays {
    let columns: HashMap<&str, &str> = tracked
        .iter()
        .map(|t| (t.status.as_str(), t.column.as_str()))
        .collect();

    let mut days: StatusDays = HashMap::new();
    for event in events {
        let Some(column) = event.to_status.as_deref().and_then(|s| columns.get(s)) else {
            continue;
        };
        let (Some(start), Some(end)) = (event.created, event.status_ended) else {
            continue;
        };
        let visit = round_to(days_between(start, end), 4);
        *days
            .entry(event.key.clone())
            .or_default()
            .entry(column.to_string())
            .or_insert(0.0) += visit;
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metrics::changelog::annotate;
    use crate::metrics::test_support::{raw_event, utc};

    #[test]
    fn test_single_visit() {
        let events = annotate(vec![
            raw_event("BC-1", "Backlog", "To Do", Some(utc(2024, 1, 2, 0))),
            raw_event("BC-1", "To Do", "Done", Some(utc(2024, 1, 10, 0))),
        ]);
        let days = status_days(&events, &Config::default().tracked_statuses);
        assert_eq!(days["BC-1"]["to_do_days"], 8.0);
        // Done isn't tracked
        assert_eq!(days["BC-1"].len(), 1);
    }

    #[test]
    fn test_revisits_add_up() {
        let events = annotate(vec![
            raw_event("BC-1", "To Do", "In Progress", Some(utc(2024, 1, 1, 0))),
            raw_event("BC-1", "In Progress", "In Review", Some(utc(2024, 1, 3, 0))),
            raw_event("BC-1", "In Review", "In Progress", Some(utc(2024, 1, 4, 0))),
            raw_event("BC-1", "In Progress", "Done", Some(utc(2024, 1, 4, 12))),
        ]);
        let days = status_days(&events, &Config::default().tracked_statuses);
        assert_eq!(days["BC-1"]["in_progress_days"], 2.5);
        assert_eq!(days["BC-1"]["in_review_days"], 1.0);
    }

    #[test]
    fn test_open_status_is_absent_not_zero() {
        let events = annotate(vec![raw_event(
            "BC-1",
            "Backlog",
            "In Progress",
            Some(utc(2024, 1, 1, 0)),
        )]);
        let days = status_days(&events, &Config::default().tracked_statuses);
        assert!(!days.contains_key("BC-1"));
    }

    #[test]
    fn test_rounds_each_visit_to_four_places() {
        let start = utc(2024, 1, 1, 0);
        let end = start + chrono::Duration::minutes(1);
        let events = annotate(vec![
            raw_event("BC-1", "Backlog", "To Do", Some(start)),
            raw_event("BC-1", "To Do", "Done", Some(end)),
        ]);
        let days = status_days(&events, &Config::default().tracked_statuses);
        assert_eq!(days["BC-1"]["to_do_days"], 0.0007);
    }
}
