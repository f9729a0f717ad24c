use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static RE_COLUMN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap());

/// A workflow status whose time is tracked, and the warehouse column it lands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedStatus {
    pub status: String,
    pub column: String,
}

impl TrackedStatus {
    fn new(status: &str, column: &str) -> Self {
        Self {
            status: status.to_string(),
            column: column.to_string(),
        }
    }
}

/// One share of a split issue type: the load type and the fraction of effort it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadShare {
    pub load_type: String,
    pub coefficient: f64,
}

/// Immutable configuration for a single run.
///
/// Every component receives the parts it needs from here explicitly; nothing
/// reads process state during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracker project key, e.g. `BC`.
    pub project: String,
    /// Status whose first exit starts the cycle-time clock.
    pub backlog_status: String,
    /// Statuses to accumulate time for. Time in backlog can't be derived
    /// from the changelog alone, so it is not tracked.
    pub tracked_statuses: Vec<TrackedStatus>,
    /// Column (one of `tracked_statuses`) used for medians and sales load.
    pub in_progress_column: String,
    /// Component name -> team.
    pub teams: BTreeMap<String, String>,
    pub sales_team: String,
    pub median_window_days: i64,
    pub fail_issue_type: String,
    /// Sales issues that are really failed research, whatever their tracker type.
    /// Only load classification sees the override; `stats_detailed` keeps the
    /// tracker's issue type for these keys.
    pub fail_overrides: Vec<String>,
    /// Issue types whose effort is split across several load types.
    /// Coefficients were derived from a manual study (Sep 2021) and are not recomputed.
    pub load_splits: BTreeMap<String, Vec<LoadShare>>,
    /// Issue type -> load type for everything that isn't split.
    pub load_types: BTreeMap<String, String>,
    /// Load type for issue types with no mapping.
    pub fallback_load_type: String,
}

impl Default for Config {
    fn default() -> Self {
        let teams = [
            ("КС", "core"),
            ("Маркетинг", "core"),
            ("Финансы", "core"),
            ("Стратегия", "core"),
            ("Core", "core"),
            ("HR", "core"),
            ("БЮ Коммерческая", "core"),
            ("Модерация", "core"),
            ("МСФО", "core"),
            ("Топ-менеджмент и СД", "core"),
            ("math", "core"),
            ("Исследователи", "core"),
            ("B2B Marketing", "sales"),
            ("Вторичка", "sales"),
            ("SMB", "sales"),
            ("Newbuilding", "sales"),
            ("Продажи", "sales"),
            ("Countryside", "sales"),
        ]
        .into_iter()
        .map(|(c, t)| (c.to_string(), t.to_string()))
        .collect();

        let fail_overrides = [
            "BC-4286", "BC-4294", "BC-4278", "BC-4265", "BC-4259", "BC-4251", "BC-4170",
            "BC-4150", "BC-4134", "BC-4035", "BC-4034", "BC-4028", "BC-4026", "BC-4014",
            "BC-4001", "BC-3994", "BC-3988", "BC-3980", "BC-3976", "BC-3951", "BC-3939",
            "BC-3938", "BC-3937", "BC-3921", "BC-3920", "BC-3915", "BC-3907", "BC-3795",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let mut load_splits = BTreeMap::new();
        load_splits.insert(
            "Ad-hoc".to_string(),
            vec![
                LoadShare {
                    load_type: "Ad-hoc и выгрузки".to_string(),
                    coefficient: 0.91,
                },
                LoadShare {
                    load_type: "Бизнесовая операционка".to_string(),
                    coefficient: 0.09,
                },
            ],
        );

        // Задача -> Проекты развития is interim: tasks should eventually be
        // split between business and tech projects by epic and customer.
        let load_types = [
            ("Ошибка", "Техническая операционка"),
            ("Fail", "Техническая операционка"),
            ("Задача", "Проекты развития"),
            ("Доработка отчета", "Проекты развития"),
            ("Новый отчет", "Проекты развития"),
        ]
        .into_iter()
        .map(|(t, l)| (t.to_string(), l.to_string()))
        .collect();

        Self {
            project: "BC".to_string(),
            backlog_status: "Backlog".to_string(),
            tracked_statuses: vec![
                TrackedStatus::new("To Do", "to_do_days"),
                TrackedStatus::new("In Progress", "in_progress_days"),
                TrackedStatus::new("In Review", "in_review_days"),
                TrackedStatus::new("Reporter Review", "reporter_review_days"),
            ],
            in_progress_column: "in_progress_days".to_string(),
            teams,
            sales_team: "sales".to_string(),
            median_window_days: 180,
            fail_issue_type: "Fail".to_string(),
            fail_overrides,
            load_splits,
            load_types,
            fallback_load_type: "Без категории".to_string(),
        }
    }
}

impl Config {
    /// Directory holding the default config and databases (`~/.devmetrics`).
    pub fn default_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".devmetrics"))
    }

    /// Read and validate a JSON config file. Fields missing from the file keep
    /// their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load an explicit config file, or `~/.devmetrics/config.json` if it
    /// exists, or fall back to the built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        let default_path = Self::default_dir()?.join("config.json");
        if default_path.exists() {
            Self::load(default_path)
        } else {
            log::debug!("No config file at {}, using defaults", default_path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.median_window_days <= 0 {
            return Err(Error::Config(format!(
                "median_window_days must be positive, got {}",
                self.median_window_days
            )));
        }

        for tracked in &self.tracked_statuses {
            if !RE_COLUMN.is_match(&tracked.column) {
                return Err(Error::Config(format!(
                    "invalid column name for status '{}': {}",
                    tracked.status, tracked.column
                )));
            }
        }
        if !self
            .tracked_statuses
            .iter()
            .any(|t| t.column == self.in_progress_column)
        {
            return Err(Error::Config(format!(
                "in_progress_column '{}' is not a tracked status column",
                self.in_progress_column
            )));
        }

        let re_key = Regex::new(&format!(r"^{}-\d+$", regex::escape(&self.project)))
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(bad) = self.fail_overrides.iter().find(|k| !re_key.is_match(k)) {
            return Err(Error::Config(format!(
                "fail override '{bad}' is not an issue key of project {}",
                self.project
            )));
        }

        for (issue_type, shares) in &self.load_splits {
            if shares.is_empty() {
                return Err(Error::Config(format!("load split for '{issue_type}' is empty")));
            }
            let total: f64 = shares.iter().map(|s| s.coefficient).sum();
            if (total - 1.0).abs() > 1e-9 {
                return Err(Error::Config(format!(
                    "load split coefficients for '{issue_type}' sum to {total}, expected 1.0"
                )));
            }
        }
        Ok(())
    }

    /// Warehouse column names of the tracked statuses, in configured order.
    pub fn status_columns(&self) -> Vec<&str> {
        self.tracked_statuses.iter().map(|t| t.column.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_ad_hoc_split() {
        let config = Config::default();
        let shares = &config.load_splits["Ad-hoc"];
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].coefficient, 0.91);
        assert_eq!(shares[1].coefficient, 0.09);
    }

    #[test]
    fn test_rejects_unbalanced_split() {
        let mut config = Config::default();
        config.load_splits.insert(
            "Задача".into(),
            vec![LoadShare {
                load_type: "Проекты развития".into(),
                coefficient: 0.5,
            }],
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 0.5"), "{err}");
    }

    #[test]
    fn test_rejects_foreign_override_key() {
        let mut config = Config::default();
        config.fail_overrides.push("XY-12".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_column_name() {
        let mut config = Config::default();
        config.tracked_statuses.push(TrackedStatus::new("QA", "qa days"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_untracked_in_progress_column() {
        let config = Config {
            in_progress_column: "doing_days".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"project": "OPS", "fail_overrides": ["OPS-1"], "median_window_days": 90}}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.project, "OPS");
        assert_eq!(config.median_window_days, 90);
        assert_eq!(config.fail_overrides, vec!["OPS-1".to_string()]);
        assert_eq!(config.backlog_status, "Backlog");
        assert_eq!(config.status_columns().len(), 4);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"project": "BC", "median_window_days": 0}}"#).unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/devmetrics.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
