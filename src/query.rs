use base64::Engine as _;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement};
use serde::Serialize;

use crate::PipelineError;

/// A single value of a result row, keeping the dynamic type the engine reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64), // Non-finite values serialize as null.
    Text(String),
    Blob(#[serde(serialize_with = "serialize_blob")] Vec<u8>),
}

fn serialize_blob<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

impl TryFrom<ValueRef<'_>> for Cell {
    type Error = rusqlite::types::FromSqlError;

    fn try_from(value: ValueRef<'_>) -> Result<Self, Self::Error> {
        Ok(match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(_) => Cell::Text(value.as_str()?.to_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        })
    }
}

/// The configured statement, prepared once on its connection and reused for
/// every line of every request served by that connection.
pub struct PreparedQuery<'conn> {
    sql: String,
    stmt: Statement<'conn>,
}

impl<'conn> PreparedQuery<'conn> {
    pub fn prepare(conn: &'conn Connection, sql: &str) -> rusqlite::Result<Self> {
        let stmt = conn.prepare(sql)?;
        Ok(Self {
            sql: sql.to_owned(),
            stmt,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Execute the statement with the fields of `record` bound, in order, as
    /// text parameters.
    ///
    /// The number of fields is not checked here; the engine rejects a
    /// mismatch and that surfaces as [`PipelineError::Execute`].
    pub fn run<'q, 'r>(
        &'q mut self,
        record: &'r [String],
    ) -> Result<QueryRows<'q, 'r>, PipelineError> {
        let rows = self
            .stmt
            .query(rusqlite::params_from_iter(record))
            .map_err(|e| match e {
                rusqlite::Error::InvalidParameterCount(_, expected) => PipelineError::execute(
                    record,
                    crate::ExecError::ArgumentCount {
                        expected,
                        got: record.len(),
                    },
                ),
                e => PipelineError::execute(record, e),
            })?;
        let headers: Vec<String> = rows
            .as_ref()
            .map(|stmt| stmt.column_names().into_iter().map(String::from).collect())
            .unwrap_or_default();
        Ok(QueryRows {
            column_count: headers.len(),
            headers,
            rows,
            record,
            done: false,
        })
    }
}

/// The result of one execution: column names and an iterator over the rows.
///
/// The underlying row set is released when this is dropped, so aborting a
/// request part way through a line does not leave the statement busy.
pub struct QueryRows<'q, 'r> {
    pub headers: Vec<String>,
    column_count: usize,
    rows: rusqlite::Rows<'q>,
    record: &'r [String],
    done: bool,
}

/// Scan every column of `row`, preserving column order and each value's type.
fn scan_row(
    row: &rusqlite::Row<'_>,
    column_count: usize,
    record: &[String],
) -> Result<Vec<Cell>, PipelineError> {
    let mut cells = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        let cell = row
            .get_ref(idx)
            .and_then(|value| {
                Cell::try_from(value).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(idx, value.data_type(), Box::new(e))
                })
            })
            .map_err(|e| PipelineError::read_results(record, e))?;
        cells.push(cell);
    }
    Ok(cells)
}

impl Iterator for QueryRows<'_, '_> {
    type Item = Result<Vec<Cell>, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = match self.rows.next() {
            Ok(Some(row)) => scan_row(row, self.column_count, self.record),
            Ok(None) => {
                self.done = true;
                return None;
            }
            // The row set's terminal error, e.g. a runtime failure while stepping.
            Err(e) => Err(PipelineError::execute(self.record, e)),
        };
        if out.is_err() {
            self.done = true;
        }
        Some(out)
    }
}
