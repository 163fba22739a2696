//! Query results.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::HeaderMap;

use crate::error::{ChError, ChResult};
use crate::protocol::command::Command;
use crate::protocol::decoder::{decode_rows, decode_with_header};
use crate::protocol::request::{
    FORMAT_ROW_BINARY, FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES, HEADER_FORMAT, HEADER_SUMMARY,
};
use crate::protocol::types::Type;
use crate::types::{Columns, Row};

/// Outcome of one statement.
///
/// Inserts carry `num_rows` (the written-row count) and nothing else.
/// RowBinary responses carry decoded `rows`; any other format leaves the
/// body untouched in `data`.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub command: Command,
    pub num_rows: Option<u64>,
    pub rows: Option<Vec<Row>>,
    /// Names and types from a `RowBinaryWithNamesAndTypes` header.
    pub columns: Option<Arc<Columns>>,
    pub data: Option<Bytes>,
    pub headers: HeaderMap,
}

impl QueryResult {
    /// Decoded rows, empty when there are none.
    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or_default()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows.unwrap_or_default()
    }

    /// Response format named by the server.
    pub fn format(&self) -> Option<&str> {
        header_str(&self.headers, HEADER_FORMAT)
    }

    /// Numeric field of `x-clickhouse-summary`, e.g. `read_rows`.
    pub fn summary(&self, field: &str) -> Option<u64> {
        summary_field(&self.headers, field)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The server sends summary counters as JSON strings; plain numbers are
/// accepted too.
pub fn summary_field(headers: &HeaderMap, field: &str) -> Option<u64> {
    let summary: serde_json::Value = serde_json::from_str(header_str(headers, HEADER_SUMMARY)?).ok()?;
    match summary.get(field)? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Build a result from a complete response body.
///
/// `types` are the caller's column types, required for bare `RowBinary`.
pub fn assemble(
    command: Command,
    headers: HeaderMap,
    body: Bytes,
    types: Option<&[Type]>,
) -> ChResult<QueryResult> {
    if command.is_insert() {
        return Ok(QueryResult {
            command,
            num_rows: Some(summary_field(&headers, "written_rows").unwrap_or(0)),
            rows: None,
            columns: None,
            data: None,
            headers,
        });
    }

    let (rows, columns, data) = match header_str(&headers, HEADER_FORMAT) {
        Some(FORMAT_ROW_BINARY) => {
            let types = types.ok_or_else(|| {
                ChError::Config("RowBinary response requires column types".to_string())
            })?;
            (Some(decode_rows(body, types)?), None, None)
        }
        Some(FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES) => {
            let (columns, rows) = decode_with_header(body)?;
            (Some(rows), Some(columns), None)
        }
        _ => (None, None, Some(body)),
    };
    Ok(QueryResult {
        command,
        num_rows: rows.as_ref().map(|r| r.len() as u64),
        rows,
        columns,
        data,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::protocol::encoder::{encode_rows, encode_rows_with_names};
    use crate::types::Value;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_insert_reads_written_rows() {
        let h = headers(&[(
            HEADER_SUMMARY,
            r#"{"read_rows":"0","written_rows":"3","written_bytes":"42"}"#,
        )]);
        let result = assemble(Command::Insert, h, Bytes::new(), None).unwrap();
        assert_eq!(result.num_rows, Some(3));
        assert!(result.rows.is_none());
        assert!(result.data.is_none());
        assert_eq!(result.summary("written_bytes"), Some(42));

        let h = headers(&[(HEADER_SUMMARY, r#"{"written_rows":5}"#)]);
        let result = assemble(Command::Insert, h, Bytes::new(), None).unwrap();
        assert_eq!(result.num_rows, Some(5));
    }

    #[test]
    fn test_row_binary_needs_types() {
        let types = vec![Type::String];
        let body = encode_rows(&[vec![Value::from("x")]], &types).unwrap();
        let h = headers(&[(HEADER_FORMAT, FORMAT_ROW_BINARY)]);

        let result = assemble(Command::Select, h.clone(), body.clone(), Some(&types)).unwrap();
        assert_eq!(result.num_rows, Some(1));
        assert_eq!(result.rows()[0][0], Value::from("x"));
        assert_eq!(result.format(), Some(FORMAT_ROW_BINARY));

        assert!(matches!(
            assemble(Command::Select, h, body, None),
            Err(ChError::Config(_))
        ));
    }

    #[test]
    fn test_header_format_carries_columns() {
        let types = vec![Type::String, Type::Bool];
        let body = encode_rows_with_names(
            &[vec![Value::from("a"), Value::Bool(true)]],
            &["name", "ok"],
            &types,
        )
        .unwrap();
        let h = headers(&[(HEADER_FORMAT, FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES)]);
        let result = assemble(Command::Show, h, body, None).unwrap();
        let columns = result.columns.clone().unwrap();
        assert_eq!(columns.names, vec!["name", "ok"]);
        assert_eq!(result.rows()[0].get_by_name("ok"), Some(&Value::Bool(true)));
        assert_eq!(result.into_rows().len(), 1);
    }

    #[test]
    fn test_other_formats_pass_through() {
        let h = headers(&[(HEADER_FORMAT, "TabSeparated")]);
        let body = Bytes::from_static(b"1\t2\n");
        let result = assemble(Command::Select, h, body.clone(), None).unwrap();
        assert_eq!(result.data, Some(body));
        assert!(result.rows().is_empty());
        assert_eq!(result.num_rows, None);

        let result = assemble(Command::Create, HeaderMap::new(), Bytes::new(), None).unwrap();
        assert_eq!(result.data, Some(Bytes::new()));
    }

    #[test]
    fn test_corrupt_body_is_an_error() {
        let h = headers(&[(HEADER_FORMAT, FORMAT_ROW_BINARY)]);
        let err = assemble(Command::Select, h, Bytes::from_static(b"\x05ab"), Some(&[Type::String]))
            .unwrap_err();
        assert!(matches!(
            err,
            ChError::Decode(DecodeError::Truncated { .. })
        ));
    }
}
