//! HTTP request assembly.
//!
//! Turns a statement, its parameters and per-query options into the parts of
//! an HTTP exchange. No I/O happens here; the driver hands the result to the
//! transport as-is.

use bytes::{Bytes, BytesMut};
use url::form_urlencoded::byte_serialize;

use super::command::{Command, Query};
use super::encoder::{encode_header, encode_row};
use super::params::Params;
use super::types::Type;
use crate::config::ChConfig;
use crate::error::{ChError, ChResult};
use crate::types::Value;

pub const FORMAT_ROW_BINARY: &str = "RowBinary";
pub const FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES: &str = "RowBinaryWithNamesAndTypes";

pub const HEADER_USER: &str = "x-clickhouse-user";
pub const HEADER_KEY: &str = "x-clickhouse-key";
pub const HEADER_FORMAT: &str = "x-clickhouse-format";
pub const HEADER_SUMMARY: &str = "x-clickhouse-summary";
pub const HEADER_EXCEPTION_CODE: &str = "x-clickhouse-exception-code";
pub const HEADER_QUERY_ID: &str = "x-clickhouse-query-id";

/// Per-query knobs layered over [`ChConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Output format override, e.g. `JSONEachRow`.
    pub format: Option<String>,
    /// Column types: decode `RowBinary` responses, or encode insert rows.
    pub types: Option<Vec<Type>>,
    /// Column names for an insert header.
    pub names: Option<Vec<String>>,
    pub settings: Vec<(String, String)>,
    /// Overrides the configured database.
    pub database: Option<String>,
    pub query_id: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn types(mut self, types: Vec<Type>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.settings.push((key.into(), value.to_string()));
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn query_id(mut self, id: impl Into<String>) -> Self {
        self.query_id = Some(id.into());
        self
    }

    /// Output format the request asks for: the explicit override, otherwise
    /// `RowBinary` when types are known, otherwise the self-describing
    /// variant for row-returning statements. Inserts ask for nothing.
    pub fn output_format(&self, command: Command) -> Option<&str> {
        if let Some(format) = &self.format {
            return Some(format);
        }
        if command.is_insert() {
            None
        } else if self.types.is_some() {
            Some(FORMAT_ROW_BINARY)
        } else if command.returns_rows() {
            Some(FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES)
        } else {
            None
        }
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Percent-encoded, without the leading `?`.
    pub query_string: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
    pub command: Command,
    /// Output format requested through `x-clickhouse-format`.
    pub format: Option<String>,
}

impl HttpRequest {
    /// Full URL against `base` (which ends in `/`).
    pub fn url(&self, base: &str) -> String {
        if self.query_string.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, self.query_string)
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn push_pair(qs: &mut String, key: &str, value: &[u8]) {
    if !qs.is_empty() {
        qs.push('&');
    }
    qs.extend(byte_serialize(key.as_bytes()));
    qs.push('=');
    qs.extend(byte_serialize(value));
}

fn query_string(config: &ChConfig, params: &Params, opts: &QueryOptions) -> ChResult<String> {
    let mut qs = String::new();
    if let Some(db) = opts.database.as_ref().or(config.database.as_ref()) {
        push_pair(&mut qs, "database", db.as_bytes());
    }
    for (key, value) in config.settings.iter().chain(&opts.settings) {
        push_pair(&mut qs, key, value.as_bytes());
    }
    if let Some(id) = &opts.query_id {
        push_pair(&mut qs, "query_id", id.as_bytes());
    }
    for (key, literal) in params.encode()? {
        push_pair(&mut qs, &key, &literal);
    }
    Ok(qs)
}

fn headers(config: &ChConfig, format: Option<&str>) -> Vec<(&'static str, String)> {
    let mut headers = Vec::with_capacity(3);
    if let Some(user) = &config.username {
        headers.push((HEADER_USER, user.clone()));
    }
    if let Some(password) = &config.password {
        headers.push((HEADER_KEY, password.clone()));
    }
    if let Some(format) = format {
        headers.push((HEADER_FORMAT, format.to_string()));
    }
    headers
}

/// Build a request whose body is the statement text. Parameters travel in
/// the URL.
pub fn build_request(
    config: &ChConfig,
    query: &Query,
    params: &Params,
    opts: &QueryOptions,
) -> ChResult<HttpRequest> {
    let format = opts.output_format(query.command()).map(str::to_string);
    Ok(HttpRequest {
        query_string: query_string(config, params, opts)?,
        headers: headers(config, format.as_deref()),
        body: query.to_bytes(),
        command: query.command(),
        format,
    })
}

/// Build an insert whose body is the statement, a newline, then the rows in
/// RowBinary. The statement must name the input format
/// (`... FORMAT RowBinary`, or `RowBinaryWithNamesAndTypes` when
/// `opts.names` is set).
pub fn build_insert<R: AsRef<[Value]>>(
    config: &ChConfig,
    query: &Query,
    rows: &[R],
    opts: &QueryOptions,
) -> ChResult<HttpRequest> {
    if !query.command().is_insert() {
        return Err(ChError::Config(format!(
            "Rows can only be sent with INSERT, got {}",
            query.command()
        )));
    }
    let types = opts
        .types
        .as_deref()
        .ok_or_else(|| ChError::Config("Inserting rows requires column types".to_string()))?;

    let mut body = BytesMut::with_capacity(query.len() + 1 + rows.len() * 16);
    query.write_to(&mut body);
    body.extend_from_slice(b"\n");
    if let Some(names) = &opts.names {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        encode_header(&mut body, &names, types)?;
    }
    for row in rows {
        encode_row(&mut body, row.as_ref(), types)?;
    }

    let format = opts.output_format(query.command()).map(str::to_string);
    Ok(HttpRequest {
        query_string: query_string(config, &Params::None, opts)?,
        headers: headers(config, format.as_deref()),
        body: body.freeze(),
        command: query.command(),
        format,
    })
}
