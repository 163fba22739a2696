//! QAIL driver for ClickHouse.
//!
//! ⚠️ **BETA** - This crate is under active development. API may change.
//!
//! Talks to the HTTP interface and exchanges rows in `RowBinary`, decoding
//! strings as zero-copy slices of the response body.
//!
//! # Example
//! ```ignore
//! use qail_clickhouse::prelude::*;
//!
//! let driver = ChDriver::new(ChConfig::new("localhost", 8123).database("analytics"))?;
//!
//! let result = driver
//!     .query_with(
//!         "SELECT id, name FROM users WHERE created > {since:Date}",
//!         Params::named([("since", Value::from(since))]),
//!         QueryOptions::new(),
//!     )
//!     .await?;
//! for row in result.rows() {
//!     let name: String = row.try_get_by_name("name")?;
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::ChConfig;
pub use driver::{ChConnection, ChDriver, ChPool, PooledConnection, QueryResult, RowStream};
pub use error::{ChError, ChResult, DecodeError, EncodeError, TypeParseError};
pub use protocol::{Command, IntWidth, Params, Query, QueryOptions, Type};
pub use types::{ChRow, ChType, Decimal, FromValue, Row, ToValue, TypeError, Value};

/// Common imports.
pub mod prelude {
    pub use crate::{ChConfig, ChDriver, ChError, ChResult, QueryResult, RowStream};
    pub use crate::{ChRow, ChType, FromValue, Row, ToValue, Value};
    pub use crate::{Command, Params, Query, QueryOptions, Type};
}
