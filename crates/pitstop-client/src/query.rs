//! Query requests and results.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::row::{Column, Row};
use crate::value::SqlValue;

/// Shape of a row in a JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFormat {
    /// Each row is a JSON object keyed by column name.
    #[default]
    Objects,
    /// Each row is a JSON array in column order.
    Arrays,
}

/// A parameterized SQL statement to run.
///
/// Values bind to `$1..$n` placeholders strictly by position; statement text
/// and values travel separately, so values are never spliced into the text.
///
/// # Example
///
/// ```
/// use pitstop_client::QueryRequest;
///
/// let request = QueryRequest::new("select * from shop where id = $1")
///     .bind(42);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct QueryRequest {
    text: String,
    values: Vec<SqlValue>,
    row_format: RowFormat,
}

impl QueryRequest {
    /// Create a request with no bound values.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
            row_format: RowFormat::default(),
        }
    }

    /// Append one bound value.
    #[must_use]
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Replace the bound values wholesale.
    #[must_use]
    pub fn values(mut self, values: Vec<SqlValue>) -> Self {
        self.values = values;
        self
    }

    /// Set the row format for the result payload.
    #[must_use]
    pub fn row_format(mut self, format: RowFormat) -> Self {
        self.row_format = format;
        self
    }

    /// Statement text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound values, in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.values
    }

    /// Requested row format.
    #[must_use]
    pub fn format(&self) -> RowFormat {
        self.row_format
    }

    /// Check that the bound value count matches the placeholders in the text.
    ///
    /// Runs locally; a mismatch never reaches the server.
    pub fn validate(&self) -> Result<()> {
        let expected = placeholder_count(&self.text);
        if expected != self.values.len() {
            return Err(Error::ParameterCount {
                expected,
                provided: self.values.len(),
            });
        }
        Ok(())
    }
}

/// Count the distinct `$n` placeholders in a statement.
///
/// Returns the highest placeholder index, skipping string literals
/// (`'...'` with `''` escapes), quoted identifiers (`"..."`), and
/// dollar-quoted bodies (`$tag$...$tag$`).
#[must_use]
pub fn placeholder_count(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        // '' inside a literal is an escaped quote
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                i += 1;
            }
            b'$' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = sql[start..end].parse::<usize>() {
                        max = max.max(n);
                    }
                    i = end;
                } else {
                    // $tag$ ... $tag$ dollar quoting, including $$
                    let mut tag_end = start;
                    while tag_end < bytes.len()
                        && (bytes[tag_end].is_ascii_alphanumeric() || bytes[tag_end] == b'_')
                    {
                        tag_end += 1;
                    }
                    if tag_end < bytes.len() && bytes[tag_end] == b'$' {
                        let closer = &sql[i..=tag_end];
                        i = tag_end + 1;
                        match sql[i..].find(closer) {
                            Some(offset) => i += offset + closer.len(),
                            None => i = bytes.len(),
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            _ => i += 1,
        }
    }

    max
}

/// The outcome of a statement.
#[derive(Debug, Clone)]
pub struct QueryResult {
    columns: Arc<Vec<Column>>,
    rows: Vec<Row>,
    row_count: u64,
    format: RowFormat,
}

impl QueryResult {
    /// Build a result set from column metadata and raw values.
    #[must_use]
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<SqlValue>>) -> Self {
        let columns = Arc::new(columns);
        let row_count = rows.len() as u64;
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            columns,
            rows,
            row_count,
            format: RowFormat::default(),
        }
    }

    /// Build a row-less result for a statement that only reports a count.
    #[must_use]
    pub fn affected(count: u64) -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            rows: Vec::new(),
            row_count: count,
            format: RowFormat::default(),
        }
    }

    /// Tag the result with a row format for payload rendering.
    #[must_use]
    pub fn with_format(mut self, format: RowFormat) -> Self {
        self.format = format;
        self
    }

    /// Result rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows returned, or rows affected for a statement without a result set.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Whether the result has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render all rows as a JSON array, shaped by the row format.
    #[must_use]
    pub fn into_payload(self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| match self.format {
                RowFormat::Objects => row.to_json_object(),
                RowFormat::Arrays => row.to_json_array(),
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn counts_placeholders() {
        assert_eq!(placeholder_count("select 1"), 0);
        assert_eq!(placeholder_count("select * from shop where id = $1"), 1);
        assert_eq!(
            placeholder_count("update shop set city = $2, state_cd = $3 where id = $1"),
            3
        );
        // out-of-order and repeated placeholders count by highest index
        assert_eq!(placeholder_count("select $1, $1, $2"), 2);
    }

    #[test]
    fn skips_quoted_regions() {
        assert_eq!(placeholder_count("select '$1'"), 0);
        assert_eq!(placeholder_count("select 'it''s $1' , $1"), 1);
        assert_eq!(placeholder_count(r#"select "$9" from t where a = $1"#), 1);
        assert_eq!(placeholder_count("select $$body $3$$, $1"), 1);
        assert_eq!(placeholder_count("select $fn$ $2 $fn$, $1"), 1);
    }

    #[test]
    fn validate_checks_arity() {
        let ok = QueryRequest::new("select * from shop where id = $1").bind(1);
        assert!(ok.validate().is_ok());

        let err = QueryRequest::new("insert into t values ($1, $2)")
            .bind(1)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ParameterCount {
                expected: 2,
                provided: 1
            }
        ));
    }

    fn two_row_result() -> QueryResult {
        QueryResult::new(
            vec![Column::new("id", 0, "INT4"), Column::new("city", 1, "TEXT")],
            vec![
                vec![SqlValue::Int4(1), SqlValue::Text("Ames".into())],
                vec![SqlValue::Int4(2), SqlValue::Text("Boone".into())],
            ],
        )
    }

    #[test]
    fn payload_objects() {
        let payload = two_row_result().into_payload();
        assert_eq!(
            payload,
            serde_json::json!([
                {"id": 1, "city": "Ames"},
                {"id": 2, "city": "Boone"},
            ])
        );
    }

    #[test]
    fn payload_arrays() {
        let payload = two_row_result().with_format(RowFormat::Arrays).into_payload();
        assert_eq!(payload, serde_json::json!([[1, "Ames"], [2, "Boone"]]));
    }

    #[test]
    fn affected_reports_count_without_rows() {
        let result = QueryResult::affected(3);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 3);
    }
}
