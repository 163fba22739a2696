//! # qail-ch
//!
//! Command-line client for ClickHouse built on `qail-clickhouse`.
//!
//! ```rust,ignore
//! use qail_ch::prelude::*;
//!
//! let config = resolve(Overrides::default(), load_files()?)?;
//! let driver = ChDriver::new(config)?;
//! let result = CliQuery::new("SELECT {n:UInt8}").param("n=1").run(&driver).await?;
//! print_result(&result, OutputFormat::Table)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod output;

pub use qail_clickhouse as driver;

pub mod prelude {
    pub use crate::config::{FileConfig, Overrides, load_files, parse_key_value, resolve};
    pub use crate::engine::CliQuery;
    pub use crate::error::*;
    pub use crate::output::{OutputFormat, print_result};
    pub use qail_clickhouse::prelude::*;
}
