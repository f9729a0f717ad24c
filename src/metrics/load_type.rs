//! Sales team load by type of work.
//!
//! Effort (days in progress) of sales issues is attributed to load types:
//! - bugs and failed research go to technical operations,
//! - ad-hoc requests are split between ad-hoc/exports and business operations
//!   using fixed coefficients,
//! - tasks and reports go to development projects.
//!
//! Shares are then reported per month.

use std::collections::{BTreeMap, HashSet};

use super::types::{IssueMetrics, LoadBucket, LoadRow};
use crate::config::Config;
use crate::date_util::round_to;

/// Classify sales issues and report each load type's share per month.
pub fn sales_efficiency(rows: &[IssueMetrics], config: &Config) -> Vec<LoadBucket> {
    let sales = sales_rows(rows, config);
    let classified = classify(sales, config);
    aggregate_by_month(&classified)
}

/// Sales rows projected to what load classification needs, with issue types
/// of known misclassified issues forced to the fail type.
pub fn sales_rows(rows: &[IssueMetrics], config: &Config) -> Vec<LoadRow> {
    let fails: HashSet<&str> = config.fail_overrides.iter().map(String::as_str).collect();
    rows.iter()
        .filter(|row| row.team.as_deref() == Some(config.sales_team.as_str()))
        .map(|row| {
            let issue_type = if fails.contains(row.key.as_str()) {
                config.fail_issue_type.clone()
            } else {
                row.issue_type.clone()
            };
            LoadRow {
                key: row.key.clone(),
                epic: row.epic.clone(),
                issue_type,
                year_created: row.year_created,
                month_created: row.month_created,
                team: config.sales_team.clone(),
                in_progress_days: row.status_day(&config.in_progress_column),
                load_type: String::new(),
            }
        })
        .collect()
}

/// Assign a load type to every row. Rows of a split issue type become one row
/// per share, each carrying its fraction of the effort.
pub fn classify(rows: Vec<LoadRow>, config: &Config) -> Vec<LoadRow> {
    let mut classified = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(shares) = config.load_splits.get(&row.issue_type) {
            for share in shares {
                classified.push(LoadRow {
                    in_progress_days: row.in_progress_days.map(|d| d * share.coefficient),
                    load_type: share.load_type.clone(),
                    ..row.clone()
                });
            }
            continue;
        }

        let load_type = match config.load_types.get(&row.issue_type) {
            Some(load_type) => load_type.clone(),
            None => {
                log::debug!(
                    "{}: no load type for issue type '{}', using '{}'",
                    row.key,
                    row.issue_type,
                    config.fallback_load_type
                );
                config.fallback_load_type.clone()
            }
        };
        classified.push(LoadRow { load_type, ..row });
    }
    classified
}

/// Sum effort per (year, month, load type) and express it as a percentage of
/// the month's total. A month totalling zero days gets `None` percentages.
pub fn aggregate_by_month(rows: &[LoadRow]) -> Vec<LoadBucket> {
    let mut effort: BTreeMap<(i32, u32, &str), f64> = BTreeMap::new();
    for row in rows {
        let (Some(year), Some(month)) = (row.year_created, row.month_created) else {
            log::warn!("{}: unknown creation month, left out of sales load", row.key);
            continue;
        };
        *effort
            .entry((year, month, row.load_type.as_str()))
            .or_insert(0.0) += row.in_progress_days.unwrap_or(0.0);
    }

    let mut month_totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for ((year, month, _), days) in &effort {
        *month_totals.entry((*year, *month)).or_insert(0.0) += days;
    }

    effort
        .into_iter()
        .map(|((year, month, load_type), days)| {
            let total = month_totals.get(&(year, month)).copied().unwrap_or(0.0);
            let percentage = if total == 0.0 {
                None
            } else {
                Some(round_to(100.0 * days / total, 2))
            };
            LoadBucket {
                year,
                month,
                load_type: load_type.to_string(),
                in_progress_days: days,
                in_progress_days_month: total,
                percentage,
            }
        })
        .collect()
}
