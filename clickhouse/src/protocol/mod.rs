//! ClickHouse HTTP protocol (pure, sync)
//!
//! No async, no I/O: type descriptors, RowBinary bytes, statement
//! classification, parameter literals and request assembly.

pub mod command;
pub mod decoder;
pub mod encoder;
pub mod params;
pub mod request;
pub mod type_parser;
pub mod types;
pub mod wire;

pub use command::{Command, Query, classify};
pub use decoder::{RowDecoder, decode_rows, decode_with_header};
pub use encoder::{encode_rows, encode_rows_with_names, encode_value};
pub use params::{Params, encode_param};
pub use request::{HttpRequest, QueryOptions, build_insert, build_request};
pub use type_parser::parse_type;
pub use types::{IntWidth, Type};
