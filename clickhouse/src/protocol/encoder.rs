//! RowBinary encoder.
//!
//! Writes `Value` rows into the exact byte layout the server expects for
//! `INSERT ... FORMAT RowBinary` (and `RowBinaryWithNamesAndTypes` when a
//! column-name list is supplied). Every value is checked against its column
//! type before anything is sent; a failed row never reaches the wire.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDate, Utc};
use num_bigint::{BigInt, Sign};
use num_traits::Signed;

use super::types::{IntWidth, Type};
use super::wire::{put_string, put_varint};
use crate::error::{EncodeError, EncodeResult};
use crate::types::Value;

fn mismatch(ty: &Type, value: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        ty: ty.to_string(),
        value: value.kind().to_string(),
    }
}

fn out_of_range(ty: &Type, value: impl ToString) -> EncodeError {
    EncodeError::OutOfRange {
        ty: ty.to_string(),
        value: value.to_string(),
    }
}

pub(crate) fn unix_epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

/// Instant carried by any datetime-like value. Naive values are read as UTC.
pub(crate) fn instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::ZonedDateTime(dt) => Some(dt.with_timezone(&Utc)),
        Value::NaiveDateTime(dt) => Some(dt.and_utc()),
        _ => None,
    }
}

/// Any integer-like value widened to `BigInt`.
fn big_integer(value: &Value) -> Option<BigInt> {
    Some(match value {
        Value::Bool(b) => BigInt::from(*b as u8),
        Value::Int(n) => BigInt::from(*n),
        Value::UInt(n) => BigInt::from(*n),
        Value::Int128(n) => BigInt::from(*n),
        Value::UInt128(n) => BigInt::from(*n),
        Value::Int256(n) => n.clone(),
        Value::UInt256(n) => BigInt::from(n.clone()),
        _ => return None,
    })
}

/// Signed integer of any width up to 128 bits, range checked.
fn signed(ty: &Type, w: IntWidth, value: &Value) -> EncodeResult<i128> {
    let n = match value {
        Value::Bool(b) => *b as i128,
        Value::Int(n) => *n as i128,
        Value::UInt(n) => *n as i128,
        Value::Int128(n) => *n,
        Value::UInt128(n) => i128::try_from(*n).map_err(|_| out_of_range(ty, n))?,
        Value::Int256(_) | Value::UInt256(_) => big_integer(value)
            .and_then(|n| i128::try_from(&n).ok())
            .ok_or_else(|| out_of_range(ty, value))?,
        other => return Err(mismatch(ty, other)),
    };
    let bits = w.bits();
    if bits < 128 {
        let max = (1i128 << (bits - 1)) - 1;
        let min = -(1i128 << (bits - 1));
        if n < min || n > max {
            return Err(out_of_range(ty, n));
        }
    }
    Ok(n)
}

/// Unsigned integer of any width up to 128 bits, range checked.
fn unsigned(ty: &Type, w: IntWidth, value: &Value) -> EncodeResult<u128> {
    let n = match value {
        Value::Bool(b) => *b as u128,
        Value::UInt(n) => *n as u128,
        Value::UInt128(n) => *n,
        Value::Int(n) => u128::try_from(*n).map_err(|_| out_of_range(ty, n))?,
        Value::Int128(n) => u128::try_from(*n).map_err(|_| out_of_range(ty, n))?,
        Value::Int256(_) | Value::UInt256(_) => big_integer(value)
            .and_then(|n| u128::try_from(&n).ok())
            .ok_or_else(|| out_of_range(ty, value))?,
        other => return Err(mismatch(ty, other)),
    };
    if w.bits() < 128 && n >> w.bits() != 0 {
        return Err(out_of_range(ty, n));
    }
    Ok(n)
}

/// Two's complement little-endian, sign-extended to `width` bytes.
fn put_bigint(buf: &mut BytesMut, ty: &Type, n: &BigInt, width: usize) -> EncodeResult<()> {
    let bytes = n.to_signed_bytes_le();
    if bytes.len() > width {
        return Err(out_of_range(ty, n));
    }
    buf.extend_from_slice(&bytes);
    let fill = if n.sign() == Sign::Minus { 0xFF } else { 0x00 };
    buf.put_bytes(fill, width - bytes.len());
    Ok(())
}

fn put_int(buf: &mut BytesMut, ty: &Type, w: IntWidth, value: &Value) -> EncodeResult<()> {
    if w == IntWidth::W256 {
        let n = big_integer(value).ok_or_else(|| mismatch(ty, value))?;
        return put_bigint(buf, ty, &n, w.bytes());
    }
    let n = signed(ty, w, value)?;
    buf.extend_from_slice(&n.to_le_bytes()[..w.bytes()]);
    Ok(())
}

fn put_uint(buf: &mut BytesMut, ty: &Type, w: IntWidth, value: &Value) -> EncodeResult<()> {
    if w == IntWidth::W256 {
        let n = big_integer(value).ok_or_else(|| mismatch(ty, value))?;
        let magnitude = n
            .to_biguint()
            .filter(|m| m.bits() <= 256)
            .ok_or_else(|| out_of_range(ty, &n))?;
        let bytes = magnitude.to_bytes_le();
        buf.extend_from_slice(&bytes);
        buf.put_bytes(0, w.bytes() - bytes.len());
        return Ok(());
    }
    let n = unsigned(ty, w, value)?;
    buf.extend_from_slice(&n.to_le_bytes()[..w.bytes()]);
    Ok(())
}

fn float(ty: &Type, value: &Value) -> EncodeResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(n) => Ok(*n as f64),
        Value::UInt(n) => Ok(*n as f64),
        other => Err(mismatch(ty, other)),
    }
}

fn put_decimal(
    buf: &mut BytesMut,
    ty: &Type,
    precision: u8,
    scale: u8,
    value: &Value,
) -> EncodeResult<()> {
    let mantissa = match value {
        Value::Decimal(d) => d.rescale(scale as u32).into_parts().0,
        other => {
            let n = big_integer(other).ok_or_else(|| mismatch(ty, other))?;
            n * BigInt::from(10u8).pow(scale as u32)
        }
    };
    if mantissa.abs() >= BigInt::from(10u8).pow(precision as u32) {
        return Err(out_of_range(ty, value));
    }
    put_bigint(buf, ty, &mantissa, Type::decimal_width(precision).bytes())
}

fn enum_code(ty: &Type, items: &[(String, i16)], value: &Value) -> EncodeResult<i16> {
    let found = match value {
        Value::String(label) => items
            .iter()
            .find(|(l, _)| l.as_bytes() == &label[..])
            .map(|(_, code)| *code)
            .ok_or_else(|| EncodeError::UnknownEnumLabel {
                ty: ty.to_string(),
                label: String::from_utf8_lossy(label).into_owned(),
            })?,
        other => {
            let code = other.as_i64().ok_or_else(|| mismatch(ty, other))?;
            items
                .iter()
                .map(|(_, c)| *c)
                .find(|c| *c as i64 == code)
                .ok_or_else(|| out_of_range(ty, code))?
        }
    };
    Ok(found)
}

/// Encode one value against its column type.
pub fn encode_value(buf: &mut BytesMut, ty: &Type, value: &Value) -> EncodeResult<()> {
    if value.is_null() && !ty.is_nullable() {
        return Err(EncodeError::UnexpectedNull(ty.to_string()));
    }

    match ty {
        Type::LowCardinality(inner) | Type::SimpleAggregateFunction(_, inner) => {
            encode_value(buf, inner, value)?
        }
        Type::Nullable(inner) => match value {
            Value::Null => buf.put_u8(1),
            present => {
                buf.put_u8(0);
                encode_value(buf, inner, present)?;
            }
        },
        Type::Int(w) => put_int(buf, ty, *w, value)?,
        Type::UInt(w) => put_uint(buf, ty, *w, value)?,
        Type::Float32 => {
            let x = float(ty, value)?;
            let narrow = x as f32;
            if x.is_finite() && !narrow.is_finite() {
                return Err(out_of_range(ty, x));
            }
            buf.put_f32_le(narrow);
        }
        Type::Float64 => buf.put_f64_le(float(ty, value)?),
        Type::Bool => match value {
            Value::Bool(b) => buf.put_u8(*b as u8),
            other => return Err(mismatch(ty, other)),
        },
        Type::String => match value {
            Value::String(s) => put_string(buf, s),
            other => return Err(mismatch(ty, other)),
        },
        Type::FixedString(size) => match value {
            Value::String(s) if s.len() <= *size => {
                buf.extend_from_slice(s);
                buf.put_bytes(0, size - s.len());
            }
            Value::String(s) => {
                return Err(EncodeError::FixedStringOverflow {
                    size: *size,
                    got: s.len(),
                });
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::Date => match value {
            Value::Date(d) => {
                let days = (*d - unix_epoch()).num_days();
                let days = u16::try_from(days).map_err(|_| out_of_range(ty, d))?;
                buf.put_u16_le(days);
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::Date32 => match value {
            Value::Date(d) => {
                let days = (*d - unix_epoch()).num_days();
                let days = i32::try_from(days).map_err(|_| out_of_range(ty, d))?;
                buf.put_i32_le(days);
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::DateTime(_) => {
            let dt = instant(value).ok_or_else(|| mismatch(ty, value))?;
            let secs = u32::try_from(dt.timestamp()).map_err(|_| out_of_range(ty, dt))?;
            buf.put_u32_le(secs);
        }
        Type::DateTime64 { precision, .. } => {
            let dt = instant(value).ok_or_else(|| mismatch(ty, value))?;
            let p = *precision as u32;
            let sub = dt.timestamp_subsec_nanos() as i64 / 10i64.pow(9u32.saturating_sub(p));
            let ticks = 10i64
                .checked_pow(p)
                .and_then(|per_second| dt.timestamp().checked_mul(per_second))
                .and_then(|t| t.checked_add(sub))
                .ok_or_else(|| out_of_range(ty, dt))?;
            buf.put_i64_le(ticks);
        }
        Type::Decimal { precision, scale } => put_decimal(buf, ty, *precision, *scale, value)?,
        Type::Uuid => match value {
            Value::Uuid(u) => {
                let (hi, lo) = u.as_u64_pair();
                buf.put_u64_le(hi);
                buf.put_u64_le(lo);
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::Ipv4 => match value {
            Value::Ipv4(ip) => buf.put_u32_le(u32::from(*ip)),
            other => return Err(mismatch(ty, other)),
        },
        Type::Ipv6 => match value {
            Value::Ipv6(ip) => buf.extend_from_slice(&ip.octets()),
            Value::Ipv4(ip) => buf.extend_from_slice(&ip.to_ipv6_mapped().octets()),
            other => return Err(mismatch(ty, other)),
        },
        Type::Enum8(items) => {
            let code = enum_code(ty, items, value)?;
            buf.put_i8(i8::try_from(code).map_err(|_| out_of_range(ty, code))?);
        }
        Type::Enum16(items) => buf.put_i16_le(enum_code(ty, items, value)?),
        Type::Array(inner) => match value {
            Value::Array(items) => {
                put_varint(buf, items.len() as u64);
                for item in items {
                    encode_value(buf, inner, item)?;
                }
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::Tuple(types) => match value {
            Value::Tuple(items) if items.len() == types.len() => {
                for (t, item) in types.iter().zip(items) {
                    encode_value(buf, t, item)?;
                }
            }
            Value::Tuple(items) => {
                return Err(EncodeError::TupleArity {
                    ty: ty.to_string(),
                    expected: types.len(),
                    got: items.len(),
                });
            }
            other => return Err(mismatch(ty, other)),
        },
        Type::Map(key, val) => match value {
            Value::Map(entries) => {
                put_varint(buf, entries.len() as u64);
                for (k, v) in entries {
                    encode_value(buf, key, k)?;
                    encode_value(buf, val, v)?;
                }
            }
            other => return Err(mismatch(ty, other)),
        },
    }
    Ok(())
}

/// Encode one row; its arity must equal the type list.
pub fn encode_row(buf: &mut BytesMut, row: &[Value], types: &[Type]) -> EncodeResult<()> {
    if row.len() != types.len() {
        return Err(EncodeError::RowArity {
            expected: types.len(),
            got: row.len(),
        });
    }
    for (ty, value) in types.iter().zip(row) {
        encode_value(buf, ty, value)?;
    }
    Ok(())
}

/// `RowBinaryWithNamesAndTypes` header: count, names, canonical type names.
pub fn encode_header(buf: &mut BytesMut, names: &[&str], types: &[Type]) -> EncodeResult<()> {
    if names.len() != types.len() {
        return Err(EncodeError::NameArity {
            names: names.len(),
            types: types.len(),
        });
    }
    put_varint(buf, names.len() as u64);
    for name in names {
        put_string(buf, name.as_bytes());
    }
    for ty in types {
        put_string(buf, ty.to_string().as_bytes());
    }
    Ok(())
}

/// Encode rows as a `RowBinary` body.
pub fn encode_rows<R: AsRef<[Value]>>(rows: &[R], types: &[Type]) -> EncodeResult<Bytes> {
    let mut buf = BytesMut::with_capacity(estimate(rows.len(), types));
    for row in rows {
        encode_row(&mut buf, row.as_ref(), types)?;
    }
    Ok(buf.freeze())
}

/// Encode rows as a `RowBinaryWithNamesAndTypes` body.
pub fn encode_rows_with_names<R: AsRef<[Value]>>(
    rows: &[R],
    names: &[&str],
    types: &[Type],
) -> EncodeResult<Bytes> {
    let mut buf = BytesMut::with_capacity(estimate(rows.len(), types) + names.len() * 16);
    encode_header(&mut buf, names, types)?;
    for row in rows {
        encode_row(&mut buf, row.as_ref(), types)?;
    }
    Ok(buf.freeze())
}

fn estimate(rows: usize, types: &[Type]) -> usize {
    let per_row: usize = types.iter().map(|t| t.fixed_size().unwrap_or(16)).sum();
    rows.saturating_mul(per_row).min(1 << 20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use uuid::Uuid;

    fn enc(ty: &str, value: Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &Type::parse(ty).unwrap(), &value).unwrap();
        buf.to_vec()
    }

    fn enc_err(ty: &str, value: Value) -> EncodeError {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &Type::parse(ty).unwrap(), &value).unwrap_err()
    }

    #[test]
    fn test_nullable() {
        assert_eq!(enc("Nullable(Int32)", Value::Null), vec![0x01]);
        assert_eq!(enc("Nullable(Int32)", Value::Int(5)), vec![0x00, 5, 0, 0, 0]);
        assert_eq!(
            enc_err("Int32", Value::Null),
            EncodeError::UnexpectedNull("Int32".into())
        );
    }

    #[test]
    fn test_integers_every_width() {
        assert_eq!(enc("Int8", Value::Int(-1)), vec![0xFF]);
        assert_eq!(enc("UInt16", Value::UInt(0x0102)), vec![0x02, 0x01]);
        assert_eq!(enc("Int64", Value::Int(-2)), (-2i64).to_le_bytes().to_vec());
        assert_eq!(enc("UInt128", Value::UInt128(1)).len(), 16);
        assert_eq!(enc("Int256", Value::Int(-1)), vec![0xFF; 32]);
        let mut expected = vec![0u8; 32];
        expected[0] = 7;
        assert_eq!(enc("UInt256", Value::UInt(7)), expected);
    }

    #[test]
    fn test_integer_range_checks() {
        assert!(matches!(
            enc_err("UInt8", Value::Int(256)),
            EncodeError::OutOfRange { .. }
        ));
        assert!(matches!(
            enc_err("Int8", Value::Int(-129)),
            EncodeError::OutOfRange { .. }
        ));
        assert!(matches!(
            enc_err("UInt32", Value::Int(-1)),
            EncodeError::OutOfRange { .. }
        ));
        assert!(matches!(
            enc_err("UInt8", Value::from("x")),
            EncodeError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_string_and_fixed_string() {
        assert_eq!(enc("String", Value::from("hi")), b"\x02hi".to_vec());
        assert_eq!(enc("FixedString(4)", Value::from("ab")), b"ab\0\0".to_vec());
        assert_eq!(
            enc_err("FixedString(2)", Value::from("abc")),
            EncodeError::FixedStringOverflow { size: 2, got: 3 }
        );
    }

    #[test]
    fn test_decimal_scaled_mantissa() {
        let v = Value::Decimal("1.23".parse().unwrap());
        assert_eq!(enc("Decimal(9, 2)", v.clone()), 123i32.to_le_bytes().to_vec());
        assert_eq!(enc("Decimal(18, 4)", v), 12300i64.to_le_bytes().to_vec());
        assert_eq!(enc("Decimal64(2)", Value::Int(-3)), (-300i64).to_le_bytes().to_vec());
        assert_eq!(
            enc("Decimal128(1)", Value::Decimal(Decimal::new(-15, 1))),
            (-15i128).to_le_bytes().to_vec()
        );
        assert!(matches!(
            enc_err("Decimal(3, 2)", Value::Decimal("10.00".parse().unwrap())),
            EncodeError::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_dates() {
        let d = NaiveDate::from_ymd_opt(1970, 1, 3).unwrap();
        assert_eq!(enc("Date", Value::Date(d)), vec![2, 0]);
        let before = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(enc("Date32", Value::Date(before)), (-1i32).to_le_bytes().to_vec());
        assert!(matches!(
            enc_err("Date", Value::Date(before)),
            EncodeError::OutOfRange { .. }
        ));

        let dt = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            enc("DateTime", Value::DateTime(dt)),
            1_609_459_200u32.to_le_bytes().to_vec()
        );
        let dt = dt + chrono::Duration::milliseconds(500);
        assert_eq!(
            enc("DateTime64(3, 'UTC')", Value::DateTime(dt)),
            1_609_459_200_500i64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_uuid_and_ip_layout() {
        let u = Uuid::from_u64_pair(0x0102030405060708, 0x090A0B0C0D0E0F10);
        let mut expected = 0x0102030405060708u64.to_le_bytes().to_vec();
        expected.extend_from_slice(&0x090A0B0C0D0E0F10u64.to_le_bytes());
        assert_eq!(enc("UUID", Value::Uuid(u)), expected);

        let ip = Ipv4Addr::new(192, 168, 0, 1);
        assert_eq!(enc("IPv4", Value::Ipv4(ip)), vec![1, 0, 168, 192]);
        assert_eq!(enc("IPv6", Value::Ipv4(ip)).len(), 16);
    }

    #[test]
    fn test_enum_by_label_or_code() {
        let ty = "Enum8('a' = 1, 'b' = -2)";
        assert_eq!(enc(ty, Value::from("b")), vec![0xFE]);
        assert_eq!(enc(ty, Value::Int(1)), vec![1]);
        assert!(matches!(
            enc_err(ty, Value::from("zz")),
            EncodeError::UnknownEnumLabel { .. }
        ));
        assert_eq!(enc("Enum16('x' = 1000)", Value::from("x")), 1000i16.to_le_bytes().to_vec());

        // hand-built Enum8 with a code the parser would reject
        let wide = Type::Enum8(vec![("big".to_string(), 300)]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_value(&mut buf, &wide, &Value::from("big")),
            Err(EncodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_float32_range() {
        assert_eq!(enc("Float32", Value::Float(1.5)), 1.5f32.to_le_bytes().to_vec());
        assert!(matches!(
            enc_err("Float32", Value::Float(1e300)),
            EncodeError::OutOfRange { .. }
        ));
        assert!(matches!(
            enc_err("Float32", Value::Float(-1e39)),
            EncodeError::OutOfRange { .. }
        ));
        assert_eq!(
            enc("Float32", Value::Float(f64::INFINITY)),
            f32::INFINITY.to_le_bytes().to_vec()
        );
        let nan = enc("Float32", Value::Float(f64::NAN));
        assert!(f32::from_le_bytes(nan.try_into().unwrap()).is_nan());
    }

    #[test]
    fn test_composites() {
        let v = Value::Array(vec![Value::from("a"), Value::Null]);
        assert_eq!(enc("Array(Nullable(String))", v), vec![2, 0, 1, b'a', 1]);

        let v = Value::Tuple(vec![Value::UInt(1), Value::from("x")]);
        assert_eq!(enc("Tuple(UInt8, String)", v), vec![1, 1, b'x']);
        assert_eq!(
            enc_err("Tuple(UInt8, String)", Value::Tuple(vec![Value::UInt(1)])),
            EncodeError::TupleArity {
                ty: "Tuple(UInt8, String)".into(),
                expected: 2,
                got: 1
            }
        );

        let v = Value::Map(vec![(Value::from("k"), Value::UInt(9))]);
        assert_eq!(enc("Map(String, UInt8)", v), vec![1, 1, b'k', 9]);

        assert_eq!(enc("LowCardinality(String)", Value::from("z")), vec![1, b'z']);
        assert_eq!(
            enc("SimpleAggregateFunction(sum, UInt64)", Value::UInt(3)),
            3u64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_rows_and_header() {
        let types = vec![Type::UInt(IntWidth::W8), Type::String];
        let rows = vec![
            vec![Value::UInt(1), Value::from("a")],
            vec![Value::UInt(2), Value::from("bc")],
        ];
        let body = encode_rows(&rows, &types).unwrap();
        assert_eq!(&body[..], &[1, 1, b'a', 2, 2, b'b', b'c']);

        let body = encode_rows_with_names(&rows[..1], &["id", "s"], &types).unwrap();
        let mut expected = vec![2, 2, b'i', b'd', 1, b's', 5];
        expected.extend_from_slice(b"UInt8");
        expected.push(6);
        expected.extend_from_slice(b"String");
        expected.extend_from_slice(&[1, 1, b'a']);
        assert_eq!(&body[..], &expected[..]);

        assert_eq!(
            encode_rows(&[vec![Value::UInt(1)]], &types).unwrap_err(),
            EncodeError::RowArity {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            encode_rows_with_names(&rows, &["id"], &types).unwrap_err(),
            EncodeError::NameArity { names: 1, types: 2 }
        );
    }
}
