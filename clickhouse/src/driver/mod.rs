//! ClickHouse driver (async I/O)
//!
//! - `connection.rs` - reqwest transport, server error mapping
//! - `pool.rs` - concurrency limit
//! - `result.rs` - response → `QueryResult`
//! - `stream.rs` - incremental `RowStream`

mod connection;
mod pool;
mod result;
mod stream;

pub use connection::{ChConnection, parse_exception_code};
pub use pool::{ChPool, PooledConnection};
pub use result::{QueryResult, assemble, summary_field};
pub use stream::RowStream;

use tracing::debug;

use crate::config::ChConfig;
use crate::error::{ChError, ChResult};
use crate::protocol::command::Query;
use crate::protocol::decoder::RowDecoder;
use crate::protocol::params::Params;
use crate::protocol::request::{
    FORMAT_ROW_BINARY, FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES, HEADER_FORMAT, HttpRequest,
    QueryOptions, build_insert, build_request,
};
use crate::types::{ChRow, Value};

/// ClickHouse client.
///
/// ```ignore
/// let driver = ChDriver::connect_url("http://default:@localhost:8123/default")?;
/// let result = driver.query("SELECT number FROM system.numbers LIMIT 3").await?;
/// for row in result.rows() {
///     println!("{}", row[0]);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChDriver {
    pool: ChPool,
}

impl ChDriver {
    pub fn new(config: ChConfig) -> ChResult<Self> {
        Ok(Self {
            pool: ChPool::new(config)?,
        })
    }

    pub fn connect_url(url: &str) -> ChResult<Self> {
        Self::new(ChConfig::from_url(url)?)
    }

    pub fn config(&self) -> &ChConfig {
        self.pool.config()
    }

    pub fn pool(&self) -> &ChPool {
        &self.pool
    }

    pub async fn query(&self, sql: impl Into<Query>) -> ChResult<QueryResult> {
        self.query_with(sql, Params::None, QueryOptions::default())
            .await
    }

    /// Run a statement with bound parameters and per-query options.
    pub async fn query_with(
        &self,
        sql: impl Into<Query>,
        params: impl Into<Params>,
        opts: QueryOptions,
    ) -> ChResult<QueryResult> {
        let query = sql.into();
        let request = build_request(self.config(), &query, &params.into(), &opts)?;
        self.execute(request, &opts).await
    }

    /// Send `rows` as the RowBinary body of an `INSERT ... FORMAT RowBinary`
    /// statement. `opts.types` is required.
    pub async fn insert<R: AsRef<[Value]>>(
        &self,
        sql: impl Into<Query>,
        rows: &[R],
        opts: QueryOptions,
    ) -> ChResult<QueryResult> {
        let query = sql.into();
        let request = build_insert(self.config(), &query, rows, &opts)?;
        self.execute(request, &opts).await
    }

    /// Insert structs into `table`, returning the written-row count.
    pub async fn insert_rows<T: ChRow>(&self, table: &str, rows: &[T]) -> ChResult<u64> {
        let sql = format!(
            "INSERT INTO {} ({}) FORMAT {}",
            table,
            T::select_list(),
            FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES
        );
        let values: Vec<Vec<Value>> = rows.iter().map(ChRow::to_values).collect();
        let opts = QueryOptions::new()
            .types(T::types())
            .names(T::columns().iter().copied());
        let result = self.insert(sql, &values, opts).await?;
        Ok(result.num_rows.unwrap_or(0))
    }

    /// Run a query and map every row through [`ChRow::from_row`]. The
    /// select list must match `T::columns()` positionally.
    pub async fn fetch_all<T: ChRow>(&self, sql: impl Into<Query>) -> ChResult<Vec<T>> {
        self.fetch_all_with(sql, Params::None).await
    }

    pub async fn fetch_all_with<T: ChRow>(
        &self,
        sql: impl Into<Query>,
        params: impl Into<Params>,
    ) -> ChResult<Vec<T>> {
        let opts = QueryOptions::new().types(T::types());
        let result = self.query_with(sql, params, opts).await?;
        result
            .rows()
            .iter()
            .map(|row| T::from_row(row).map_err(ChError::from))
            .collect()
    }

    /// Stream rows as they arrive. Only RowBinary output can be streamed:
    /// bare `RowBinary` when `opts.types` is set, otherwise
    /// `RowBinaryWithNamesAndTypes`.
    pub async fn query_stream(
        &self,
        sql: impl Into<Query>,
        params: impl Into<Params>,
        mut opts: QueryOptions,
    ) -> ChResult<RowStream> {
        let query = sql.into();
        if !query.command().returns_rows() {
            return Err(ChError::Config(format!(
                "Cannot stream rows from {}",
                query.command()
            )));
        }
        let requested = if opts.types.is_some() {
            FORMAT_ROW_BINARY
        } else {
            FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES
        };
        match opts.format.as_deref() {
            None => opts.format = Some(requested.to_string()),
            Some(f) if f == requested => {}
            Some(f) => {
                return Err(ChError::Config(format!("Cannot stream format {}", f)));
            }
        }

        let request = build_request(self.config(), &query, &params.into(), &opts)?;
        let conn = self.pool.get().await?;
        debug!(
            "Streaming {} ({} bytes, format {})",
            request.command,
            request.body.len(),
            requested
        );
        let command = request.command;
        let response = conn.send(request).await?;
        let headers = response.headers().clone();

        let format = headers
            .get(HEADER_FORMAT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(requested);
        let decoder = match (format, opts.types) {
            (FORMAT_ROW_BINARY, Some(types)) => RowDecoder::new(types),
            (FORMAT_ROW_BINARY_WITH_NAMES_AND_TYPES, _) => RowDecoder::with_header(),
            (other, _) => {
                return Err(ChError::Config(format!(
                    "Server answered with unstreamable format {}",
                    other
                )));
            }
        };

        let chunks = Box::pin(response.bytes_stream());
        Ok(RowStream::new(chunks, decoder, command, headers, conn))
    }

    /// `GET /ping`.
    pub async fn ping(&self) -> ChResult<()> {
        self.pool.get().await?.ping().await
    }

    async fn execute(&self, request: HttpRequest, opts: &QueryOptions) -> ChResult<QueryResult> {
        let conn = self.pool.get().await?;
        debug!(
            "Executing {} ({} bytes, format {:?})",
            request.command,
            request.body.len(),
            request.format
        );
        let command = request.command;
        let response = conn.send(request).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        drop(conn);
        assemble(command, headers, body, opts.types.as_deref())
    }
}
