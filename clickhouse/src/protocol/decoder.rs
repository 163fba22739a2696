//! RowBinary decoder.
//!
//! Two entry modes:
//! - explicit types (`RowBinary`): rows start at byte 0
//! - embedded header (`RowBinaryWithNamesAndTypes`): column count, names and
//!   type descriptors come first and drive every following row
//!
//! A buffer must be consumed exactly. Strings are `Bytes` slices of the
//! response buffer, never copies.
//!
//! `RowDecoder` is the incremental variant for streamed responses: a row may
//! span chunk boundaries, so the undecoded tail of each chunk is carried over.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Days, Duration};
use num_bigint::{BigInt, BigUint};
use uuid::Uuid;

use super::encoder::unix_epoch;
use super::types::{IntWidth, Type};
use super::wire::Reader;
use crate::error::{DecodeError, DecodeResult};
use crate::types::{Columns, Decimal, Row, Value};

fn read_signed(r: &mut Reader, w: IntWidth) -> DecodeResult<Value> {
    let src = r.take(w.bytes())?;
    if w == IntWidth::W256 {
        return Ok(Value::Int256(BigInt::from_signed_bytes_le(src)));
    }
    let fill = if src[src.len() - 1] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut raw = [fill; 16];
    raw[..src.len()].copy_from_slice(src);
    let n = i128::from_le_bytes(raw);
    Ok(if w == IntWidth::W128 {
        Value::Int128(n)
    } else {
        Value::Int(n as i64)
    })
}

fn read_unsigned(r: &mut Reader, w: IntWidth) -> DecodeResult<Value> {
    let src = r.take(w.bytes())?;
    if w == IntWidth::W256 {
        return Ok(Value::UInt256(BigUint::from_bytes_le(src)));
    }
    let mut raw = [0u8; 16];
    raw[..src.len()].copy_from_slice(src);
    let n = u128::from_le_bytes(raw);
    Ok(if w == IntWidth::W128 {
        Value::UInt128(n)
    } else {
        Value::UInt(n as u64)
    })
}

/// Most elements a zero-width `Array` or `Map` may claim.
pub const MAX_ZERO_WIDTH_ELEMENTS: usize = 1 << 20;

/// Element count of an `Array`, `Map` or header. Elements that occupy at
/// least one byte cannot outnumber the remaining input; zero-width elements
/// are capped instead.
fn read_count(r: &mut Reader, zero_width: bool) -> DecodeResult<usize> {
    let offset = r.position();
    let n = r.read_varint()?;
    let n = usize::try_from(n)
        .map_err(|_| DecodeError::invalid("element count", format!("{} at offset {}", n, offset)))?;
    if zero_width {
        if n > MAX_ZERO_WIDTH_ELEMENTS {
            return Err(DecodeError::invalid(
                "element count",
                format!("{} zero-width elements at offset {}", n, offset),
            ));
        }
    } else if n > r.remaining() {
        return Err(DecodeError::Truncated {
            offset: r.position(),
            needed: n - r.remaining(),
        });
    }
    Ok(n)
}

fn is_zero_width(ty: &Type) -> bool {
    ty.fixed_size() == Some(0)
}

fn enum_label(ty: &Type, items: &[(String, i16)], code: i16) -> DecodeResult<Value> {
    items
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(label, _)| Value::String(Bytes::copy_from_slice(label.as_bytes())))
        .ok_or_else(|| DecodeError::UnknownEnumCode {
            ty: ty.to_string(),
            code,
        })
}

/// Decode one value of type `ty`.
pub fn decode_value(r: &mut Reader, ty: &Type) -> DecodeResult<Value> {
    let value = match ty {
        Type::LowCardinality(inner) | Type::SimpleAggregateFunction(_, inner) => {
            decode_value(r, inner)?
        }
        Type::Nullable(inner) => match r.read_u8()? {
            0 => decode_value(r, inner)?,
            1 => Value::Null,
            flag => {
                return Err(DecodeError::invalid(
                    "null flag",
                    format!("{} at offset {}", flag, r.position() - 1),
                ));
            }
        },
        Type::Int(w) => read_signed(r, *w)?,
        Type::UInt(w) => read_unsigned(r, *w)?,
        Type::Float32 => Value::Float(f32::from_le_bytes(r.read_array()?) as f64),
        Type::Float64 => Value::Float(f64::from_le_bytes(r.read_array()?)),
        Type::Bool => match r.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            b => return Err(DecodeError::invalid("Bool", b.to_string())),
        },
        Type::String => Value::String(r.read_string()?),
        Type::FixedString(n) => Value::String(r.read_bytes(*n)?),
        Type::Date => {
            let days = u16::from_le_bytes(r.read_array()?);
            Value::Date(
                unix_epoch()
                    .checked_add_days(Days::new(days as u64))
                    .ok_or_else(|| DecodeError::invalid("Date", days.to_string()))?,
            )
        }
        Type::Date32 => {
            let days = i32::from_le_bytes(r.read_array()?);
            Value::Date(
                unix_epoch()
                    .checked_add_signed(Duration::days(days as i64))
                    .ok_or_else(|| DecodeError::invalid("Date32", days.to_string()))?,
            )
        }
        Type::DateTime(_) => {
            let secs = u32::from_le_bytes(r.read_array()?);
            Value::DateTime(
                DateTime::from_timestamp(secs as i64, 0)
                    .ok_or_else(|| DecodeError::invalid("DateTime", secs.to_string()))?,
            )
        }
        Type::DateTime64 { precision, .. } => {
            let ticks = i64::from_le_bytes(r.read_array()?);
            let p = *precision as u32;
            let per_second = 10i64
                .checked_pow(p)
                .ok_or_else(|| DecodeError::invalid("DateTime64 precision", p.to_string()))?;
            let secs = ticks.div_euclid(per_second);
            let nanos = ticks.rem_euclid(per_second) * 10i64.pow(9u32.saturating_sub(p));
            Value::DateTime(
                DateTime::from_timestamp(secs, nanos as u32)
                    .ok_or_else(|| DecodeError::invalid("DateTime64", ticks.to_string()))?,
            )
        }
        Type::Decimal { precision, scale } => {
            let src = r.take(Type::decimal_width(*precision).bytes())?;
            Value::Decimal(Decimal::new(
                BigInt::from_signed_bytes_le(src),
                *scale as u32,
            ))
        }
        Type::Uuid => {
            let hi = u64::from_le_bytes(r.read_array()?);
            let lo = u64::from_le_bytes(r.read_array()?);
            Value::Uuid(Uuid::from_u64_pair(hi, lo))
        }
        Type::Ipv4 => Value::Ipv4(Ipv4Addr::from(u32::from_le_bytes(r.read_array()?))),
        Type::Ipv6 => Value::Ipv6(Ipv6Addr::from(r.read_array::<16>()?)),
        Type::Enum8(items) => enum_label(ty, items, i8::from_le_bytes(r.read_array()?) as i16)?,
        Type::Enum16(items) => enum_label(ty, items, i16::from_le_bytes(r.read_array()?))?,
        Type::Array(inner) => {
            let n = read_count(r, is_zero_width(inner))?;
            let mut items = Vec::with_capacity(n.min(r.remaining()));
            for _ in 0..n {
                items.push(decode_value(r, inner)?);
            }
            Value::Array(items)
        }
        Type::Tuple(types) => Value::Tuple(
            types
                .iter()
                .map(|t| decode_value(r, t))
                .collect::<DecodeResult<_>>()?,
        ),
        Type::Map(key, val) => {
            let n = read_count(r, is_zero_width(key) && is_zero_width(val))?;
            let mut entries = Vec::with_capacity(n.min(r.remaining()));
            for _ in 0..n {
                let k = decode_value(r, key)?;
                let v = decode_value(r, val)?;
                entries.push((k, v));
            }
            Value::Map(entries)
        }
    };
    Ok(value)
}

/// Decode one row positionally.
pub fn decode_row(r: &mut Reader, types: &[Type]) -> DecodeResult<Vec<Value>> {
    types.iter().map(|t| decode_value(r, t)).collect()
}

/// Read a `RowBinaryWithNamesAndTypes` header.
pub fn decode_header(r: &mut Reader) -> DecodeResult<Columns> {
    let n = read_count(r, false)?;
    let mut names = Vec::with_capacity(n.min(r.remaining()));
    for _ in 0..n {
        let raw = r.read_string()?;
        let name = std::str::from_utf8(&raw)
            .map_err(|e| DecodeError::invalid("column name", e.to_string()))?;
        names.push(name.to_string());
    }
    let mut types = Vec::with_capacity(names.len());
    for _ in 0..n {
        let raw = r.read_string()?;
        let text = std::str::from_utf8(&raw)
            .map_err(|e| DecodeError::invalid("type name", e.to_string()))?;
        types.push(Type::parse(text)?);
    }
    Ok(Columns::new(names, types))
}

fn decode_all(
    r: &mut Reader,
    types: &[Type],
    columns: Option<&Arc<Columns>>,
) -> DecodeResult<Vec<Row>> {
    if types.is_empty() {
        return if r.is_empty() {
            Ok(Vec::new())
        } else {
            Err(DecodeError::TrailingBytes(r.remaining()))
        };
    }
    let mut rows = Vec::new();
    while !r.is_empty() {
        let mark = r.position();
        let values = decode_row(r, types)?;
        if r.position() == mark {
            return Err(DecodeError::TrailingBytes(r.remaining()));
        }
        rows.push(match columns {
            Some(c) => Row::with_columns(values, c.clone()),
            None => Row::new(values),
        });
    }
    Ok(rows)
}

/// Decode a `RowBinary` body against a known type list.
pub fn decode_rows(buf: Bytes, types: &[Type]) -> DecodeResult<Vec<Row>> {
    decode_all(&mut Reader::new(buf), types, None)
}

/// Decode a `RowBinaryWithNamesAndTypes` body.
pub fn decode_with_header(buf: Bytes) -> DecodeResult<(Arc<Columns>, Vec<Row>)> {
    let mut r = Reader::new(buf);
    let columns = Arc::new(decode_header(&mut r)?);
    let rows = decode_all(&mut r, &columns.types, Some(&columns))?;
    Ok((columns, rows))
}

/// Incremental decoder for chunked responses.
///
/// `feed` returns every row completed by the chunk. Bytes of an unfinished
/// row (or header) are kept until the next chunk; `finish` reports them as
/// truncated input. After a short read the decoder waits until at least the
/// missing byte count has arrived before decoding again, so a large row is
/// not re-decoded on every chunk.
#[derive(Debug)]
pub struct RowDecoder {
    types: Vec<Type>,
    columns: Option<Arc<Columns>>,
    header_pending: bool,
    /// Undecoded bytes from the last attempt, sliced from the decoded buffer.
    tail: Bytes,
    /// Chunks received since the last attempt.
    pending: BytesMut,
    /// Buffered length required before the next attempt.
    want: usize,
    consumed: usize,
}

impl RowDecoder {
    /// Decoder for a `RowBinary` stream.
    pub fn new(types: Vec<Type>) -> Self {
        Self {
            types,
            columns: None,
            header_pending: false,
            tail: Bytes::new(),
            pending: BytesMut::new(),
            want: 0,
            consumed: 0,
        }
    }

    /// Decoder for a `RowBinaryWithNamesAndTypes` stream.
    pub fn with_header() -> Self {
        Self {
            header_pending: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Column names and types, once the header has been read.
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.columns.as_ref()
    }

    /// Bytes held back for the next chunk.
    pub fn buffered(&self) -> usize {
        self.tail.len() + self.pending.len()
    }

    fn take_buffered(&mut self, chunk: &[u8]) -> Bytes {
        let mut joined = BytesMut::with_capacity(self.buffered() + chunk.len());
        joined.extend_from_slice(&self.tail);
        joined.extend_from_slice(&self.pending);
        joined.extend_from_slice(chunk);
        self.tail = Bytes::new();
        self.pending.clear();
        joined.freeze()
    }

    /// Keep `data[mark..]` for later. `needed` is how far the short read
    /// ran past the end of `data`.
    fn hold(&mut self, data: &Bytes, mark: usize, needed: usize) {
        self.tail = data.slice(mark..);
        self.want = self.tail.len().saturating_add(needed);
        self.consumed += mark;
    }

    pub fn feed(&mut self, chunk: Bytes) -> DecodeResult<Vec<Row>> {
        if self.buffered() + chunk.len() < self.want {
            self.pending.extend_from_slice(&chunk);
            return Ok(Vec::new());
        }
        self.want = 0;
        let data = if self.buffered() == 0 {
            chunk
        } else {
            self.take_buffered(&chunk)
        };
        let mut r = Reader::new(data.clone());

        if self.header_pending {
            match decode_header(&mut r) {
                Ok(columns) => {
                    self.types = columns.types.clone();
                    self.columns = Some(Arc::new(columns));
                    self.header_pending = false;
                }
                Err(DecodeError::Truncated { needed, .. }) => {
                    self.hold(&data, 0, needed);
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            }
        }

        if self.types.is_empty() {
            self.consumed += r.position();
            return match r.remaining() {
                0 => Ok(Vec::new()),
                n => Err(DecodeError::TrailingBytes(n)),
            };
        }

        let mut rows = Vec::new();
        while !r.is_empty() {
            let mark = r.position();
            match decode_row(&mut r, &self.types) {
                Ok(_) if r.position() == mark => {
                    return Err(DecodeError::TrailingBytes(r.remaining()));
                }
                Ok(values) => rows.push(match &self.columns {
                    Some(c) => Row::with_columns(values, c.clone()),
                    None => Row::new(values),
                }),
                Err(DecodeError::Truncated { needed, .. }) => {
                    self.hold(&data, mark, needed);
                    return Ok(rows);
                }
                Err(e) => return Err(e),
            }
        }
        self.consumed += r.position();
        Ok(rows)
    }

    /// End of stream. Leftover bytes mean the last row was cut short.
    pub fn finish(&self) -> DecodeResult<()> {
        let len = self.buffered();
        if len == 0 {
            return Ok(());
        }
        let mut data = BytesMut::with_capacity(len);
        data.extend_from_slice(&self.tail);
        data.extend_from_slice(&self.pending);
        let mut r = Reader::new(data.freeze());
        let err = if self.header_pending {
            decode_header(&mut r).err()
        } else {
            decode_row(&mut r, &self.types).err()
        };
        Err(match err {
            Some(DecodeError::Truncated { offset, needed }) => DecodeError::Truncated {
                offset: self.consumed + offset,
                needed,
            },
            Some(other) => other,
            None => DecodeError::TrailingBytes(len),
        })
    }
}
