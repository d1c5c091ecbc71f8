//! Embedded SQL engine for one exam session.

use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use examgate_core::error::QueryError;
use examgate_core::traits::{QueryEngine, QueryOutput, SqlValue};

/// An in-memory SQLite database seeded with a question set's dataset.
///
/// Owned by a single exam session and released on drop. Every query runs in
/// a transaction that is rolled back afterwards, so writes never leak into
/// later questions.
pub struct SqlSession {
    conn: Mutex<Connection>,
}

impl SqlSession {
    /// Open a fresh database and run `seed_sql` (schema and rows) once.
    pub fn open(seed_sql: Option<&str>) -> Result<Self, QueryError> {
        let conn = Connection::open_in_memory().map_err(engine_error)?;
        if let Some(seed) = seed_sql {
            conn.execute_batch(seed)
                .map_err(|e| QueryError::Engine(format!("failed to seed dataset: {e}")))?;
        }
        tracing::debug!(seeded = seed_sql.is_some(), "opened SQL session");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl QueryEngine for SqlSession {
    fn run_query(&self, sql: &str) -> Result<QueryOutput, QueryError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| QueryError::Engine("SQL session lock poisoned".into()))?;

        let tx = conn.transaction().map_err(engine_error)?;
        let output = collect_rows(&tx, sql);
        tx.rollback().map_err(engine_error)?;
        output
    }
}

fn collect_rows(conn: &Connection, sql: &str) -> Result<QueryOutput, QueryError> {
    let mut stmt = conn.prepare(sql).map_err(execution_error)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(execution_error)?;
    while let Some(row) = cursor.next().map_err(execution_error)? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_sql_value(row.get_ref(i).map_err(execution_error)?));
        }
        rows.push(values);
    }

    Ok(QueryOutput::new(columns, rows))
}

fn to_sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

fn engine_error(e: rusqlite::Error) -> QueryError {
    QueryError::Engine(e.to_string())
}

fn execution_error(e: rusqlite::Error) -> QueryError {
    QueryError::Execution(e.to_string())
}
