//! Query parameter literals (`param_<name>=<literal>` in the URL).
//!
//! The server parses a parameter value with the escaped text format of the
//! declared type, so a top-level string only needs backslash, tab and newline
//! escaped. Inside composites (`[...]`, `(...)`, `{...}`) strings and other
//! text-like values are single-quoted.

use std::borrow::Cow;

use chrono::{DateTime, Timelike, Utc};

use crate::error::{EncodeError, EncodeResult};
use crate::types::{Decimal, Value};

/// Escapes for a top-level value in the escaped text format.
fn text_escape(b: u8) -> Option<&'static [u8]> {
    match b {
        b'\\' => Some(b"\\\\"),
        b'\t' => Some(b"\\t"),
        b'\n' => Some(b"\\n"),
        _ => None,
    }
}

/// Escapes inside a single-quoted literal.
fn quote_escape(b: u8) -> Option<&'static [u8]> {
    match b {
        b'\'' => Some(b"\\'"),
        b'\\' => Some(b"\\\\"),
        _ => None,
    }
}

/// Single pass; unmodified runs are copied in bulk and a clean input is
/// returned borrowed.
fn escape_with(s: &[u8], rule: fn(u8) -> Option<&'static [u8]>) -> Cow<'_, [u8]> {
    let Some(first) = s.iter().position(|b| rule(*b).is_some()) else {
        return Cow::Borrowed(s);
    };
    let mut out = Vec::with_capacity(s.len() + 8);
    let mut start = 0;
    for (i, b) in s.iter().enumerate().skip(first) {
        if let Some(replacement) = rule(*b) {
            out.extend_from_slice(&s[start..i]);
            out.extend_from_slice(replacement);
            start = i + 1;
        }
    }
    out.extend_from_slice(&s[start..]);
    Cow::Owned(out)
}

/// Escape a top-level string parameter.
pub fn escape_text(s: &[u8]) -> Cow<'_, [u8]> {
    escape_with(s, text_escape)
}

/// Escape the body of a single-quoted literal.
pub fn escape_quoted(s: &[u8]) -> Cow<'_, [u8]> {
    escape_with(s, quote_escape)
}

fn put_quoted(buf: &mut Vec<u8>, s: &[u8]) {
    buf.push(b'\'');
    buf.extend_from_slice(&escape_quoted(s));
    buf.push(b'\'');
}

/// Text-like values: escaped at top level, quoted when nested.
fn put_text(buf: &mut Vec<u8>, s: &[u8], nested: bool) {
    if nested {
        put_quoted(buf, s);
    } else {
        buf.extend_from_slice(&escape_text(s));
    }
}

/// Unix timestamp; sub-second values become `secs.fraction` with trailing
/// zeros dropped.
fn put_timestamp(buf: &mut Vec<u8>, dt: &DateTime<Utc>) {
    let secs = dt.timestamp();
    let mut units = dt.nanosecond() as i64;
    if units == 0 {
        buf.extend_from_slice(itoa::Buffer::new().format(secs).as_bytes());
        return;
    }
    let mut precision = 9u32;
    while units % 10 == 0 {
        units /= 10;
        precision -= 1;
    }
    let scaled = i128::from(secs) * 10i128.pow(precision) + i128::from(units);
    buf.extend_from_slice(Decimal::new(scaled, precision).to_string().as_bytes());
}

fn put_list<'a>(
    buf: &mut Vec<u8>,
    open: u8,
    close: u8,
    items: impl Iterator<Item = &'a Value>,
) -> EncodeResult<()> {
    buf.push(open);
    for (i, item) in items.enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        write_literal(buf, item, true)?;
    }
    buf.push(close);
    Ok(())
}

fn write_literal(buf: &mut Vec<u8>, value: &Value, nested: bool) -> EncodeResult<()> {
    match value {
        Value::Null if nested => buf.extend_from_slice(b"NULL"),
        Value::Null => buf.extend_from_slice(b"\\N"),
        Value::Bool(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Int(n) => buf.extend_from_slice(itoa::Buffer::new().format(*n).as_bytes()),
        Value::UInt(n) => buf.extend_from_slice(itoa::Buffer::new().format(*n).as_bytes()),
        Value::Int128(n) => buf.extend_from_slice(itoa::Buffer::new().format(*n).as_bytes()),
        Value::UInt128(n) => buf.extend_from_slice(itoa::Buffer::new().format(*n).as_bytes()),
        Value::Int256(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::UInt256(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::Float(f) => buf.extend_from_slice(ryu::Buffer::new().format(*f).as_bytes()),
        Value::Decimal(d) => buf.extend_from_slice(d.to_string().as_bytes()),
        Value::String(s) => put_text(buf, s, nested),
        Value::Date(d) => put_text(buf, d.format("%Y-%m-%d").to_string().as_bytes(), nested),
        Value::NaiveDateTime(dt) => put_text(
            buf,
            dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string().as_bytes(),
            nested,
        ),
        Value::DateTime(dt) => put_timestamp(buf, dt),
        Value::ZonedDateTime(dt) if dt.offset().local_minus_utc() == 0 => {
            put_timestamp(buf, &dt.with_timezone(&Utc))
        }
        Value::ZonedDateTime(dt) => {
            return Err(EncodeError::Unsupported(format!(
                "datetime {} is not UTC; convert it before binding",
                dt.to_rfc3339()
            )));
        }
        Value::Uuid(u) => {
            let mut tmp = [0u8; 36];
            put_text(buf, u.hyphenated().encode_lower(&mut tmp).as_bytes(), nested);
        }
        Value::Ipv4(ip) => put_text(buf, ip.to_string().as_bytes(), nested),
        Value::Ipv6(ip) => put_text(buf, ip.to_string().as_bytes(), nested),
        Value::Array(items) => put_list(buf, b'[', b']', items.iter())?,
        Value::Tuple(items) => put_list(buf, b'(', b')', items.iter())?,
        Value::Map(entries) => {
            buf.push(b'{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_literal(buf, k, true)?;
                buf.push(b':');
                write_literal(buf, v, true)?;
            }
            buf.push(b'}');
        }
    }
    Ok(())
}

/// Render one parameter value. A top-level string without escapable bytes
/// is returned borrowed.
pub fn encode_param(value: &Value) -> EncodeResult<Cow<'_, [u8]>> {
    if let Value::String(s) = value {
        return Ok(escape_text(s));
    }
    let mut buf = Vec::new();
    write_literal(&mut buf, value, false)?;
    Ok(Cow::Owned(buf))
}

/// Parameters bound to a statement.
///
/// Named parameters are referenced in SQL as `{name:Type}`; positional ones
/// as `{$0:Type}`, `{$1:Type}`, ...
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    Named(Vec<(String, Value)>),
    Positional(Vec<Value>),
}

impl Params {
    pub fn named<K, V>(iter: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn positional<V: Into<Value>>(iter: impl IntoIterator<Item = V>) -> Self {
        Params::Positional(iter.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Named(p) => p.is_empty(),
            Params::Positional(p) => p.is_empty(),
        }
    }

    /// `(query-string key, literal)` pairs.
    pub fn encode(&self) -> EncodeResult<Vec<(String, Cow<'_, [u8]>)>> {
        match self {
            Params::None => Ok(Vec::new()),
            Params::Named(params) => params
                .iter()
                .map(|(name, v)| Ok((format!("param_{}", name), encode_param(v)?)))
                .collect(),
            Params::Positional(params) => params
                .iter()
                .enumerate()
                .map(|(i, v)| Ok((format!("param_${}", i), encode_param(v)?)))
                .collect(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(values: Vec<(String, Value)>) -> Self {
        Params::Named(values)
    }
}
