use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::config::Config;
use crate::metrics::{IssueMetrics, LoadBucket, MedianRow, Tables};

pub const DETAILED_TABLE: &str = "stats_detailed";
pub const MEDIAN_TABLE: &str = "stats_median";
pub const SALES_EFFICIENCY_TABLE: &str = "sales_efficiency";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

fn column(name: &str, column_type: ColumnType) -> Column {
    Column {
        name: name.to_string(),
        column_type,
    }
}

/// A named table ready to be written to the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
}

/// One row of the `load_runs` audit table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRun {
    pub run_id: String,
    pub table_name: String,
    pub row_count: i64,
    pub loaded_at: String,
}

/// The warehouse representation of a run's output.
pub fn warehouse_tables(tables: &Tables, config: &Config) -> Vec<Table> {
    vec![
        detailed_table(&tables.detailed, &config.status_columns()),
        median_table(&tables.median),
        sales_efficiency_table(&tables.sales_efficiency),
    ]
}

fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

fn integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn detailed_table(rows: &[IssueMetrics], status_columns: &[&str]) -> Table {
    use ColumnType::*;

    let mut columns = vec![
        column("key", Text),
        column("epic", Text),
        column("epic_name", Text),
        column("issue_type", Text),
        column("assignee", Text),
        column("reporter", Text),
        column("component", Text),
        column("team", Text),
        column("status", Text),
        column("issue_created", Text),
        column("done", Text),
        column("week_created", Integer),
        column("month_created", Integer),
        column("year_created", Integer),
        column("year_week_created", Text),
        column("sp", Integer),
        column("ct_days", Real),
        column("lt_days", Real),
    ];
    columns.extend(status_columns.iter().map(|name| column(name, Real)));

    let rows = rows
        .iter()
        .map(|r| {
            let mut values = vec![
                Value::Text(r.key.clone()),
                text(r.epic.as_deref()),
                text(r.epic_name.as_deref()),
                Value::Text(r.issue_type.clone()),
                text(r.assignee.as_deref()),
                text(r.reporter.as_deref()),
                text(r.component.as_deref()),
                text(r.team.as_deref()),
                Value::Text(r.status.clone()),
                text(r.created.map(|d| d.format("%Y-%m-%d").to_string()).as_deref()),
                text(r.done.map(|d| d.format("%Y-%m-%d").to_string()).as_deref()),
                integer(r.week_created.map(i64::from)),
                integer(r.month_created.map(i64::from)),
                integer(r.year_created.map(i64::from)),
                text(r.year_week_created.as_deref()),
                integer(r.story_points.map(i64::from)),
                real(r.ct_days),
                real(r.lt_days),
            ];
            values.extend(status_columns.iter().map(|c| real(r.status_day(c))));
            values
        })
        .collect();

    Table {
        name: DETAILED_TABLE.to_string(),
        columns,
        rows,
    }
}

fn median_table(rows: &[MedianRow]) -> Table {
    use ColumnType::*;

    Table {
        name: MEDIAN_TABLE.to_string(),
        columns: vec![
            column("team", Text),
            column("issue_type", Text),
            column("ct_days", Real),
            column("in_progress_days", Real),
            column("lt_days", Real),
        ],
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    Value::Text(r.team.clone()),
                    Value::Text(r.issue_type.clone()),
                    real(r.ct_days),
                    real(r.in_progress_days),
                    real(r.lt_days),
                ]
            })
            .collect(),
    }
}

fn sales_efficiency_table(rows: &[LoadBucket]) -> Table {
    use ColumnType::*;

    Table {
        name: SALES_EFFICIENCY_TABLE.to_string(),
        columns: vec![
            column("year_created", Integer),
            column("month_created", Integer),
            column("load_type", Text),
            column("in_progress_days", Real),
            column("in_progress_days_month", Real),
            column("percentage", Real),
        ],
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    Value::Integer(i64::from(r.year)),
                    Value::Integer(i64::from(r.month)),
                    Value::Text(r.load_type.clone()),
                    Value::Real(r.in_progress_days),
                    Value::Real(r.in_progress_days_month),
                    real(r.percentage),
                ]
            })
            .collect(),
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Drop and recreate `table`, insert all rows and record the load, in one
/// transaction. Loading the same table twice leaves the same contents.
pub fn replace_table(
    conn: &mut Connection,
    table: &Table,
    run_id: &str,
) -> Result<LoadReport, rusqlite::Error> {
    let name = quote(&table.name);
    let columns = table
        .columns
        .iter()
        .map(|c| format!("{} {}", quote(&c.name), c.column_type.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=table.columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({columns});"
    ))?;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.execute(
        "INSERT INTO load_runs (run_id, table_name, row_count, loaded_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![run_id, table.name, table.rows.len() as i64],
    )?;
    tx.commit()?;

    Ok(LoadReport {
        table: table.name.clone(),
        rows: table.rows.len(),
    })
}

pub fn recent_loads(conn: &Connection, limit: u32) -> Result<Vec<LoadRun>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT run_id, table_name, row_count, loaded_at
         FROM load_runs
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(LoadRun {
            run_id: row.get(0)?,
            table_name: row.get(1)?,
            row_count: row.get(2)?,
            loaded_at: row.get(3)?,
        })
    })?;
    rows.collect()
}
