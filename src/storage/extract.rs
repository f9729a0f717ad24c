use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};

use crate::date_util::parse_timestamp;
use crate::metrics::story_points;
use crate::metrics::{Issue, RawStatusEvent, SprintIssue};

/// Issues of a project excluding canceled ones, epics and stories, one row
/// per component. Issues without components get a single row with a NULL
/// component. Epic names come from the epic issues themselves.
const ISSUES_SQL: &str = "
    WITH t AS (
        SELECT i.key
            ,i.epic
            ,i.assignee_key
            ,i.reporter_key
            ,i.issue_type
            ,c.value AS component_id
            ,i.status
            ,i.sprints
            ,i.labels
            ,i.created
            ,i.done
        FROM issues i
        LEFT JOIN json_each(CASE WHEN json_valid(i.components) THEN i.components ELSE '[]' END) c
        WHERE i.status != 'Canceled'
            AND i.issue_type NOT IN ('Epic', 'История')
            AND i.project_key = ?1
    )
    SELECT t.key
        ,t.epic
        ,e.summary AS epic_name
        ,t.issue_type
        ,a.name AS assignee
        ,r.name AS reporter
        ,comp.name AS component
        ,t.status
        ,t.sprints
        ,t.labels
        ,t.created
        ,t.done
    FROM t
    LEFT JOIN jira_users a ON t.assignee_key = a.key
    LEFT JOIN jira_users r ON t.reporter_key = r.key
    LEFT JOIN components comp ON t.component_id = comp.id
    LEFT JOIN (SELECT key, summary FROM issues WHERE issue_type = 'Epic') e ON t.epic = e.key
    ORDER BY t.key, comp.name";

/// Status changes of the same issues. Ordering inside an issue's timeline is
/// established later; this only fixes a stable read order.
const CHANGELOG_SQL: &str = "
    SELECT i.key
        ,c.from_string
        ,c.to_string
        ,c.created
    FROM issues i
    JOIN changelog c ON i.id = c.issue_id
    WHERE i.status != 'Canceled'
        AND i.issue_type NOT IN ('Epic', 'История')
        AND i.project_key = ?1
        AND c.field_id = 'status'
    ORDER BY i.key, c.created, c.rowid";

const SPRINT_SQL: &str = "
    SELECT i.key
        ,i.status
        ,i.done
        ,i.labels
        ,comp.name AS component
    FROM issues i
    JOIN json_each(CASE WHEN json_valid(i.sprints) THEN i.sprints ELSE '[]' END) s
    LEFT JOIN json_each(CASE WHEN json_valid(i.components) THEN i.components ELSE '[]' END) c
    LEFT JOIN components comp ON c.value = comp.id
    WHERE i.project_key = ?1
        AND s.value = ?2
    ORDER BY i.key, comp.name";

pub fn extract_issues(conn: &Connection, project: &str) -> Result<Vec<Issue>, rusqlite::Error> {
    let mut stmt = conn.prepare(ISSUES_SQL)?;
    let rows = stmt.query_map(params![project], |row| {
        let key: String = row.get(0)?;
        Ok(Issue {
            epic: row.get(1)?,
            epic_name: row.get(2)?,
            issue_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            assignee: row.get(4)?,
            reporter: row.get(5)?,
            component: row.get(6)?,
            status: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            sprints: list_column(row, 8, &key, "sprints")?,
            labels: list_column(row, 9, &key, "labels")?,
            created: timestamp_column(row, 10, &key, "created")?,
            done: timestamp_column(row, 11, &key, "done")?,
            story_points: None,
            key,
        })
    })?;
    rows.collect()
}

pub fn extract_changelog(
    conn: &Connection,
    project: &str,
) -> Result<Vec<RawStatusEvent>, rusqlite::Error> {
    let mut stmt = conn.prepare(CHANGELOG_SQL)?;
    let rows = stmt.query_map(params![project], |row| {
        let key: String = row.get(0)?;
        Ok(RawStatusEvent {
            from_status: row.get(1)?,
            to_status: row.get(2)?,
            created: timestamp_column(row, 3, &key, "changelog created")?,
            key,
        })
    })?;
    rows.collect()
}

pub fn extract_sprint(
    conn: &Connection,
    project: &str,
    sprint: &str,
) -> Result<Vec<SprintIssue>, rusqlite::Error> {
    let mut stmt = conn.prepare(SPRINT_SQL)?;
    let rows = stmt.query_map(params![project, sprint], |row| {
        let key: String = row.get(0)?;
        let labels = list_column(row, 3, &key, "labels")?;
        Ok(SprintIssue {
            status: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            done: timestamp_column(row, 2, &key, "done")?,
            story_points: story_points::estimate(&labels),
            labels,
            component: row.get(4)?,
            key,
        })
    })?;
    rows.collect()
}

/// A timestamp column; unparseable values become `None` and the row is kept.
fn timestamp_column(
    row: &Row<'_>,
    idx: usize,
    key: &str,
    column: &str,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let parsed = match row.get_ref(idx)? {
        ValueRef::Null => return Ok(None),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_timestamp),
        ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0),
        ValueRef::Real(_) | ValueRef::Blob(_) => None,
    };
    if parsed.is_none() {
        log::debug!("{key}: malformed {column} timestamp, treated as null");
    }
    Ok(parsed)
}

/// A JSON array of strings; NULL or malformed values become an empty list.
fn list_column(
    row: &Row<'_>,
    idx: usize,
    key: &str,
    column: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let ValueRef::Text(bytes) = row.get_ref(idx)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_slice(bytes) {
        Ok(values) => Ok(values),
        Err(e) => {
            log::debug!("{key}: malformed {column} list ({e}), treated as empty");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::Connection;

    /// Minimal schema of the tracker mirror.
    pub const SCHEMA: &str = "
        CREATE TABLE issues (
            id INTEGER PRIMARY KEY,
            key TEXT NOT NULL,
            project_key TEXT,
            epic TEXT,
            summary TEXT,
            issue_type TEXT,
            assignee_key TEXT,
            reporter_key TEXT,
            status TEXT,
            components TEXT,
            sprints TEXT,
            labels TEXT,
            created TEXT,
            done TEXT
        );
        CREATE TABLE jira_users (key TEXT PRIMARY KEY, name TEXT);
        CREATE TABLE components (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE changelog (
            id INTEGER PRIMARY KEY,
            issue_id INTEGER,
            field_id TEXT,
            from_string TEXT,
            to_string TEXT,
            created TEXT
        );";

    /// BC-1 is a done sales/core task, BC-2 an open bug with a broken
    /// creation date. Everything else must be filtered out.
    pub fn seed(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(
            "INSERT INTO jira_users (key, name) VALUES ('u1', 'Alice'), ('u2', 'Bob');
             INSERT INTO components (id, name) VALUES (1, 'Продажи'), (2, 'Core');
             INSERT INTO issues (id, key, project_key, epic, summary, issue_type, assignee_key, reporter_key, status, components, sprints, labels, created, done) VALUES
               (1, 'BC-100', 'BC', NULL, 'Sales reports', 'Epic', 'u1', 'u2', 'In Progress', '[]', '[]', '[]', '2023-12-01 00:00:00', NULL),
               (2, 'BC-1', 'BC', 'BC-100', 'Funnel report', 'Задача', 'u1', 'u2', 'Done', '[1, 2]', '[\"Core.S10\"]', '[\"m\"]', '2024-01-01 00:00:00', '2024-01-10 00:00:00'),
               (3, 'BC-2', 'BC', NULL, 'Broken export', 'Ошибка', 'u2', 'u1', 'In Progress', '[]', '[\"Core.S11\"]', NULL, 'garbage', NULL),
               (4, 'BC-3', 'BC', NULL, 'Dropped idea', 'Задача', 'u1', 'u1', 'Canceled', '[1]', '[\"Core.S10\"]', '[]', '2024-01-01 00:00:00', NULL),
               (5, 'OT-1', 'OT', NULL, 'Other project', 'Задача', 'u1', 'u1', 'Done', '[1]', '[\"Core.S10\"]', '[]', '2024-01-01 00:00:00', '2024-01-02 00:00:00'),
               (6, 'BC-4', 'BC', NULL, 'A story', 'История', 'u1', 'u1', 'Done', '[1]', '[]', '[]', '2024-01-01 00:00:00', '2024-01-02 00:00:00');
             INSERT INTO changelog (issue_id, field_id, from_string, to_string, created) VALUES
               (2, 'status', 'To Do', 'Done', '2024-01-10 00:00:00'),
               (2, 'status', 'Backlog', 'To Do', '2024-01-02 00:00:00'),
               (2, 'assignee', 'Bob', 'Alice', '2024-01-03 00:00:00'),
               (3, 'status', 'Backlog', 'In Progress', '2024-01-05 00:00:00'),
               (4, 'status', 'Backlog', 'To Do', '2024-01-02 00:00:00');",
        )
    }
}
