//! Query execution for the CLI.
//!
//! Command-line arguments are strings; this turns them into the driver's
//! `Query`, `Params` and `QueryOptions` and runs the statement.

use std::io::Write;

use futures_util::StreamExt;
use qail_clickhouse::protocol::parse_type;
use qail_clickhouse::{ChDriver, Params, Query, QueryOptions, QueryResult, Type, Value};

use crate::config::parse_key_value;
use crate::error::{CliError, CliResult};
use crate::output::{json_lines, positional_names};

/// A statement with its command-line bindings.
///
/// ```rust,ignore
/// let result = CliQuery::new("SELECT {n:UInt8} + 1")
///     .param("n=41")
///     .run(&driver)
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CliQuery {
    sql: String,
    named: Vec<String>,
    positional: Vec<String>,
    types: Vec<String>,
    format: Option<String>,
}

impl CliQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    /// `NAME=VALUE`, referenced as `{NAME:Type}`.
    pub fn param(mut self, arg: impl Into<String>) -> Self {
        self.named.push(arg.into());
        self
    }

    /// Positional value, referenced as `{$0:Type}`, `{$1:Type}`, ...
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Column type for bare `RowBinary` decoding, one per result column.
    pub fn column_type(mut self, descriptor: impl Into<String>) -> Self {
        self.types.push(descriptor.into());
        self
    }

    pub fn format(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }

    /// Values are sent as text; the server parses them by the type named
    /// in the placeholder.
    pub fn params(&self) -> CliResult<Params> {
        match (self.named.is_empty(), self.positional.is_empty()) {
            (true, true) => Ok(Params::None),
            (false, true) => {
                let pairs = self
                    .named
                    .iter()
                    .map(|arg| parse_key_value(arg).map(|(k, v)| (k, Value::from(v))))
                    .collect::<CliResult<Vec<_>>>()?;
                Ok(Params::Named(pairs))
            }
            (true, false) => Ok(Params::positional(self.positional.iter().map(String::as_str))),
            (false, false) => Err(CliError::argument(
                "--param/--bind",
                "named and positional parameters cannot be mixed",
            )),
        }
    }

    pub fn options(&self) -> CliResult<QueryOptions> {
        let mut opts = QueryOptions::new();
        if !self.types.is_empty() {
            let types = self
                .types
                .iter()
                .map(|t| parse_type(t))
                .collect::<Result<Vec<Type>, _>>()
                .map_err(qail_clickhouse::ChError::from)?;
            opts = opts.types(types);
        }
        if let Some(format) = &self.format {
            opts = opts.format(format.clone());
        }
        Ok(opts)
    }

    pub fn query(&self) -> Query {
        Query::from(&self.sql)
    }

    pub async fn run(&self, driver: &ChDriver) -> CliResult<QueryResult> {
        let result = driver
            .query_with(self.query(), self.params()?, self.options()?)
            .await?;
        Ok(result)
    }

    /// Stream the result, writing one JSON object per row to `out` as
    /// batches arrive. Returns the row count.
    pub async fn stream(&self, driver: &ChDriver, out: &mut impl Write) -> CliResult<u64> {
        let mut rows = driver
            .query_stream(self.query(), self.params()?, self.options()?)
            .await?;
        let mut count = 0u64;
        while let Some(batch) = rows.next().await {
            let batch = batch?;
            let names = match rows.columns() {
                Some(columns) => columns.names.clone(),
                None => positional_names(&batch),
            };
            for line in json_lines(&names, &batch) {
                writeln!(out, "{}", line)?;
            }
            count += batch.len() as u64;
        }
        out.flush()?;
        Ok(count)
    }
}
