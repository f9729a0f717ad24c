use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::types::{IssueMetrics, MedianRow};

#[derive(Default)]
struct Samples {
    ct_days: Vec<f64>,
    lt_days: Vec<f64>,
    in_progress_days: Vec<f64>,
}

/// Median cycle time, lead time and in-progress days per (team, issue type),
/// over issues created within the last `window_days` of `now`.
///
/// Rows without a team are left out. Nulls are ignored; a group whose values
/// are all null gets a `None` median. Output is sorted by team, then type.
pub fn median_by_team_and_type(
    rows: &[IssueMetrics],
    in_progress_column: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<MedianRow> {
    let cutoff = now - Duration::days(window_days);

    let mut groups: BTreeMap<(String, String), Samples> = BTreeMap::new();
    for row in rows {
        let Some(created) = row.created.and_then(|d| d.and_hms_opt(0, 0, 0)) else {
            continue;
        };
        if created.and_utc() < cutoff {
            continue;
        }
        let Some(team) = &row.team else {
            continue;
        };

        let samples = groups
            .entry((team.clone(), row.issue_type.clone()))
            .or_default();
        samples.ct_days.extend(row.ct_days);
        samples.lt_days.extend(row.lt_days);
        samples
            .in_progress_days
            .extend(row.status_day(in_progress_column));
    }

    groups
        .into_iter()
        .map(|((team, issue_type), mut samples)| MedianRow {
            team,
            issue_type,
            ct_days: median(&mut samples.ct_days),
            lt_days: median(&mut samples.lt_days),
            in_progress_days: median(&mut samples.in_progress_days),
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len().is_multiple_of(2) {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{metrics_row, utc};
    use chrono::NaiveDate;

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [9.0, 1.0, 5.0]), Some(5.0));
        assert_eq!(median(&mut [3.0, 7.0]), Some(5.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_groups_by_team_and_type() {
        let created = NaiveDate::from_ymd_opt(2024, 5, 1);
        let mut a = metrics_row("BC-1", "Задача", Some("sales"), created);
        a.ct_days = Some(2.0);
        a.lt_days = Some(4.0);
        a.status_days.insert("in_progress_days".into(), 1.0);
        let mut b = metrics_row("BC-2", "Задача", Some("sales"), created);
        b.ct_days = Some(4.0);
        b.lt_days = Some(8.0);
        let mut c = metrics_row("BC-3", "Ошибка", Some("core"), created);
        c.lt_days = Some(1.0);

        let medians =
            median_by_team_and_type(&[a, b, c], "in_progress_days", 180, utc(2024, 6, 1, 0));
        assert_eq!(medians.len(), 2);

        assert_eq!(medians[0].team, "core");
        assert_eq!(medians[0].ct_days, None);
        assert_eq!(medians[0].lt_days, Some(1.0));

        assert_eq!(medians[1].team, "sales");
        assert_eq!(medians[1].issue_type, "Задача");
        assert_eq!(medians[1].ct_days, Some(3.0));
        assert_eq!(medians[1].lt_days, Some(6.0));
        // nulls ignored, not counted as zero
        assert_eq!(medians[1].in_progress_days, Some(1.0));
    }

    #[test]
    fn test_window_is_inclusive() {
        let now = utc(2024, 7, 1, 0);
        let on_cutoff = NaiveDate::from_ymd_opt(2024, 1, 3); // now - 180 days
        let before = NaiveDate::from_ymd_opt(2024, 1, 2);

        let mut inside = metrics_row("BC-1", "Задача", Some("core"), on_cutoff);
        inside.lt_days = Some(10.0);
        let mut outside = metrics_row("BC-2", "Задача", Some("core"), before);
        outside.lt_days = Some(100.0);

        let medians = median_by_team_and_type(&[inside, outside], "in_progress_days", 180, now);
        assert_eq!(medians.len(), 1);
        assert_eq!(medians[0].lt_days, Some(10.0));
    }

    #[test]
    fn test_rows_without_team_or_date_are_skipped() {
        let created = NaiveDate::from_ymd_opt(2024, 5, 1);
        let rows = [
            metrics_row("BC-1", "Задача", None, created),
            metrics_row("BC-2", "Задача", Some("core"), None),
        ];
        let medians = median_by_team_and_type(&rows, "in_progress_days", 180, utc(2024, 6, 1, 0));
        assert!(medians.is_empty());
    }
}
