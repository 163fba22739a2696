//! Value model and native Rust type conversions.
//!
//! `Value` is what the RowBinary codec consumes and produces. The traits here
//! are an optional adapter layer on top: they map Rust types onto `Value` and
//! `Type` and nothing in `protocol` depends on them.

pub mod decimal;
mod row;

pub use decimal::Decimal;
pub use row::{ChRow, Columns, Row};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use num_bigint::{BigInt, BigUint};
use uuid::Uuid;

use crate::protocol::types::{IntWidth, Type};

/// Error type for conversions between `Value` and Rust types.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// Value variant does not convert to the requested Rust type
    UnexpectedValue {
        expected: &'static str,
        got: &'static str,
    },
    /// Value converts but does not fit
    OutOfRange { expected: &'static str, value: String },
    /// Invalid textual or binary data
    InvalidData(String),
    /// Null value where non-null expected
    UnexpectedNull,
    /// Row has no column with this name
    MissingColumn(String),
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UnexpectedValue { expected, got } => {
                write!(f, "Expected {}, got {} value", expected, got)
            }
            TypeError::OutOfRange { expected, value } => {
                write!(f, "Value {} out of range for {}", value, expected)
            }
            TypeError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            TypeError::UnexpectedNull => write!(f, "Unexpected NULL value"),
            TypeError::MissingColumn(name) => write!(f, "No column named '{}'", name),
        }
    }
}

impl std::error::Error for TypeError {}

/// A single decoded or to-be-encoded cell.
///
/// Strings are raw bytes: ClickHouse `String` is not required to be UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Int128(i128),
    UInt128(u128),
    Int256(BigInt),
    UInt256(BigUint),
    Float(f64),
    Decimal(Decimal),
    String(Bytes),
    Date(NaiveDate),
    NaiveDateTime(NaiveDateTime),
    DateTime(DateTime<Utc>),
    ZonedDateTime(DateTime<FixedOffset>),
    Uuid(Uuid),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::UInt(_) => "UInt",
            Value::Int128(_) => "Int128",
            Value::UInt128(_) => "UInt128",
            Value::Int256(_) => "Int256",
            Value::UInt256(_) => "UInt256",
            Value::Float(_) => "Float",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::NaiveDateTime(_) => "NaiveDateTime",
            Value::DateTime(_) => "DateTime",
            Value::ZonedDateTime(_) => "ZonedDateTime",
            Value::Uuid(_) => "UUID",
            Value::Ipv4(_) => "IPv4",
            Value::Ipv6(_) => "IPv6",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String contents, when they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Int128(v) => i64::try_from(*v).ok(),
            Value::UInt128(v) => i64::try_from(*v).ok(),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Int128(v) => u64::try_from(*v).ok(),
            Value::UInt128(v) => u64::try_from(*v).ok(),
            Value::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }
}

fn write_list<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Int128(n) => write!(f, "{}", n),
            Value::UInt128(n) => write!(f, "{}", n),
            Value::Int256(n) => write!(f, "{}", n),
            Value::UInt256(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            Value::Date(d) => write!(f, "{}", d),
            Value::NaiveDateTime(dt) => write!(f, "{}", dt),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::ZonedDateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Ipv4(ip) => write!(f, "{}", ip),
            Value::Ipv6(ip) => write!(f, "{}", ip),
            Value::Array(items) => write_list(f, "[", "]", items.iter()),
            Value::Tuple(items) => write_list(f, "(", ")", items.iter()),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Convert a Rust value into a `Value` for encoding or parameter binding.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert a decoded `Value` into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, TypeError>;
}

/// Default ClickHouse column type for a Rust type.
pub trait ChType {
    fn ch_type() -> Type;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        Ok(value)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

/// Integer types; `from_value` accepts any integer variant that fits.
macro_rules! impl_int {
    ($($t:ty => $variant:ident, $ty:expr);* $(;)?) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::$variant((*self).into())
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> Result<Self, TypeError> {
                let out_of_range = |v: &Value| TypeError::OutOfRange {
                    expected: stringify!($t),
                    value: v.to_string(),
                };
                match &value {
                    Value::Bool(b) => Ok(<$t>::from(*b)),
                    Value::Int(v) => <$t>::try_from(*v).map_err(|_| out_of_range(&value)),
                    Value::UInt(v) => <$t>::try_from(*v).map_err(|_| out_of_range(&value)),
                    Value::Int128(v) => <$t>::try_from(*v).map_err(|_| out_of_range(&value)),
                    Value::UInt128(v) => <$t>::try_from(*v).map_err(|_| out_of_range(&value)),
                    Value::Null => Err(TypeError::UnexpectedNull),
                    other => Err(TypeError::UnexpectedValue {
                        expected: stringify!($t),
                        got: other.kind(),
                    }),
                }
            }
        }

        impl ChType for $t {
            fn ch_type() -> Type {
                $ty
            }
        }
    )*};
}

impl_int! {
    i8 => Int, Type::Int(IntWidth::W8);
    i16 => Int, Type::Int(IntWidth::W16);
    i32 => Int, Type::Int(IntWidth::W32);
    i64 => Int, Type::Int(IntWidth::W64);
    i128 => Int128, Type::Int(IntWidth::W128);
    u8 => UInt, Type::UInt(IntWidth::W8);
    u16 => UInt, Type::UInt(IntWidth::W16);
    u32 => UInt, Type::UInt(IntWidth::W32);
    u64 => UInt, Type::UInt(IntWidth::W64);
    u128 => UInt128, Type::UInt(IntWidth::W128);
}

/// Values that hold as-is; `from_value` only checks the variant.
macro_rules! impl_direct {
    ($($t:ty => $variant:ident, $ty:expr);* $(;)?) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> Result<Self, TypeError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    Value::Null => Err(TypeError::UnexpectedNull),
                    other => Err(TypeError::UnexpectedValue {
                        expected: stringify!($t),
                        got: other.kind(),
                    }),
                }
            }
        }

        impl ChType for $t {
            fn ch_type() -> Type {
                $ty
            }
        }
    )*};
}

impl_direct! {
    bool => Bool, Type::Bool;
    NaiveDate => Date, Type::Date;
    Uuid => Uuid, Type::Uuid;
    Ipv4Addr => Ipv4, Type::Ipv4;
    Ipv6Addr => Ipv6, Type::Ipv6;
    Bytes => String, Type::String;
}

/// `BigInt` pinned to `Int256` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Int256(pub BigInt);

/// `BigUint` pinned to `UInt256` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UInt256(pub BigUint);

impl ToValue for Int256 {
    fn to_value(&self) -> Value {
        Value::Int256(self.0.clone())
    }
}

impl ToValue for UInt256 {
    fn to_value(&self) -> Value {
        Value::UInt256(self.0.clone())
    }
}

impl ChType for Int256 {
    fn ch_type() -> Type {
        Type::Int(IntWidth::W256)
    }
}

impl ChType for UInt256 {
    fn ch_type() -> Type {
        Type::UInt(IntWidth::W256)
    }
}

impl FromValue for Int256 {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        let n = match value {
            Value::Int256(n) => n,
            Value::UInt256(n) => BigInt::from(n),
            Value::Int(n) => BigInt::from(n),
            Value::UInt(n) => BigInt::from(n),
            Value::Int128(n) => BigInt::from(n),
            Value::UInt128(n) => BigInt::from(n),
            Value::Null => return Err(TypeError::UnexpectedNull),
            other => {
                return Err(TypeError::UnexpectedValue {
                    expected: "Int256",
                    got: other.kind(),
                });
            }
        };
        Ok(Int256(n))
    }
}

impl FromValue for UInt256 {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        let n = match &value {
            Value::UInt256(n) => Some(n.clone()),
            Value::Int256(n) => n.to_biguint(),
            Value::UInt(n) => Some(BigUint::from(*n)),
            Value::UInt128(n) => Some(BigUint::from(*n)),
            Value::Int(n) => BigInt::from(*n).to_biguint(),
            Value::Int128(n) => BigInt::from(*n).to_biguint(),
            Value::Null => return Err(TypeError::UnexpectedNull),
            other => {
                return Err(TypeError::UnexpectedValue {
                    expected: "UInt256",
                    got: other.kind(),
                });
            }
        };
        n.map(UInt256).ok_or_else(|| TypeError::OutOfRange {
            expected: "UInt256",
            value: value.to_string(),
        })
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Null => Err(TypeError::UnexpectedNull),
            other => other.as_f64().ok_or(TypeError::UnexpectedValue {
                expected: "f64",
                got: other.kind(),
            }),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl ChType for f32 {
    fn ch_type() -> Type {
        Type::Float32
    }
}

impl ChType for f64 {
    fn ch_type() -> Type {
        Type::Float64
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(Bytes::copy_from_slice(self.as_bytes()))
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        self.as_str().to_value()
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::String(b) => String::from_utf8(b.to_vec())
                .map_err(|e| TypeError::InvalidData(format!("Invalid UTF-8: {}", e))),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::UnexpectedValue {
                expected: "String",
                got: other.kind(),
            }),
        }
    }
}

impl ChType for String {
    fn ch_type() -> Type {
        Type::String
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(self.clone())
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(n) => Ok(Decimal::from(n)),
            Value::UInt(n) => Ok(Decimal::from(n)),
            Value::Int128(n) => Ok(Decimal::from(n)),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::UnexpectedValue {
                expected: "Decimal",
                got: other.kind(),
            }),
        }
    }
}

#[cfg(feature = "rust_decimal")]
impl ToValue for rust_decimal::Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(Decimal::from(*self))
    }
}

#[cfg(feature = "rust_decimal")]
impl FromValue for rust_decimal::Decimal {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        let d = Decimal::from_value(value)?;
        rust_decimal::Decimal::try_from(&d)
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::NaiveDateTime(*self)
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::NaiveDateTime(dt) => Ok(dt),
            Value::DateTime(dt) => Ok(dt.naive_utc()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::UnexpectedValue {
                expected: "NaiveDateTime",
                got: other.kind(),
            }),
        }
    }
}

impl ChType for NaiveDateTime {
    fn ch_type() -> Type {
        Type::DateTime(None)
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::ZonedDateTime(dt) => Ok(dt.with_timezone(&Utc)),
            Value::NaiveDateTime(dt) => Ok(dt.and_utc()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::UnexpectedValue {
                expected: "DateTime<Utc>",
                got: other.kind(),
            }),
        }
    }
}

impl ChType for DateTime<Utc> {
    fn ch_type() -> Type {
        Type::DateTime(Some("UTC".to_string()))
    }
}

impl ToValue for DateTime<FixedOffset> {
    fn to_value(&self) -> Value {
        Value::ZonedDateTime(*self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ChType> ChType for Option<T> {
    fn ch_type() -> Type {
        Type::nullable(T::ch_type())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::UnexpectedValue {
                expected: "Vec",
                got: other.kind(),
            }),
        }
    }
}

impl<T: ChType> ChType for Vec<T> {
    fn ch_type() -> Type {
        Type::array(T::ch_type())
    }
}

fn map_entries<K, V>(value: Value) -> Result<Vec<(K, V)>, TypeError>
where
    K: FromValue,
    V: FromValue,
{
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect(),
        Value::Null => Err(TypeError::UnexpectedNull),
        other => Err(TypeError::UnexpectedValue {
            expected: "Map",
            got: other.kind(),
        }),
    }
}

impl<K: ToValue, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        Ok(map_entries(value)?.into_iter().collect())
    }
}

impl<K: ChType, V: ChType> ChType for BTreeMap<K, V> {
    fn ch_type() -> Type {
        Type::map(K::ch_type(), V::ch_type())
    }
}

impl<K: ToValue, V: ToValue, S> ToValue for HashMap<K, V, S> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(value: Value) -> Result<Self, TypeError> {
        Ok(map_entries(value)?.into_iter().collect())
    }
}

impl<K: ChType, V: ChType, S> ChType for HashMap<K, V, S> {
    fn ch_type() -> Type {
        Type::map(K::ch_type(), V::ch_type())
    }
}

macro_rules! impl_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ToValue),+> ToValue for ($($name,)+) {
            fn to_value(&self) -> Value {
                Value::Tuple(vec![$(self.$idx.to_value()),+])
            }
        }

        impl<$($name: FromValue),+> FromValue for ($($name,)+) {
            fn from_value(value: Value) -> Result<Self, TypeError> {
                let arity = [$($idx),+].len();
                match value {
                    Value::Tuple(items) if items.len() == arity => {
                        let mut items = items.into_iter();
                        Ok(($(
                            $name::from_value(items.next().ok_or(TypeError::UnexpectedNull)?)?,
                        )+))
                    }
                    Value::Null => Err(TypeError::UnexpectedNull),
                    other => Err(TypeError::UnexpectedValue {
                        expected: "Tuple",
                        got: other.kind(),
                    }),
                }
            }
        }

        impl<$($name: ChType),+> ChType for ($($name,)+) {
            fn ch_type() -> Type {
                Type::Tuple(vec![$($name::ch_type()),+])
            }
        }
    };
}

impl_tuple!(A: 0);
impl_tuple!(A: 0, B: 1);
impl_tuple!(A: 0, B: 1, C: 2);
impl_tuple!(A: 0, B: 1, C: 2, D: 3);

macro_rules! impl_from_for_value {
    ($($t:ty),* $(,)?) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                v.to_value()
            }
        }
    )*};
}

impl_from_for_value!(
    bool, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64, String, &str, Decimal,
    NaiveDate, NaiveDateTime, DateTime<Utc>, DateTime<FixedOffset>, Uuid, Ipv4Addr, Ipv6Addr,
    Bytes,
);

impl<T: ToValue> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        v.to_value()
    }
}

impl<T: ToValue> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_conversions() {
        assert_eq!(i32::from_value(Value::UInt(7)).unwrap(), 7);
        assert_eq!(u8::from_value(Value::Int(255)).unwrap(), 255);
        assert_eq!(
            u8::from_value(Value::Int(256)),
            Err(TypeError::OutOfRange {
                expected: "u8",
                value: "256".into()
            })
        );
        assert!(u32::from_value(Value::Int(-1)).is_err());
        assert_eq!(i128::from_value(Value::Int128(-5)).unwrap(), -5);
        assert_eq!(
            i64::from_value(Value::Float(1.0)),
            Err(TypeError::UnexpectedValue {
                expected: "i64",
                got: "Float"
            })
        );
        assert_eq!(i64::from_value(Value::Null), Err(TypeError::UnexpectedNull));
    }

    #[test]
    fn test_nullable_and_array() {
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Some(3u16).to_value(), Value::UInt(3));
        assert_eq!(None::<u16>.to_value(), Value::Null);
        assert_eq!(
            Vec::<i32>::from_value(Value::Array(vec![Value::Int(1), Value::Int(2)])).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            <Option<Vec<String>>>::ch_type().to_string(),
            "Nullable(Array(String))"
        );
    }

    #[test]
    fn test_tuple_and_map() {
        let v = (1u8, "x").to_value();
        assert_eq!(v, Value::Tuple(vec![Value::UInt(1), Value::from("x")]));
        let back: (u8, String) = FromValue::from_value(v).unwrap();
        assert_eq!(back, (1, "x".to_string()));

        let mut m = BTreeMap::new();
        m.insert("a".to_string(), 1u64);
        assert_eq!(<BTreeMap<String, u64>>::ch_type().to_string(), "Map(String, UInt64)");
        let back = BTreeMap::<String, u64>::from_value(m.to_value()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_value_display() {
        let v = Value::Array(vec![
            Value::from("a"),
            Value::Null,
            Value::Tuple(vec![Value::Int(1), Value::Bool(true)]),
        ]);
        assert_eq!(v.to_string(), "[a, NULL, (1, true)]");
        let m = Value::Map(vec![(Value::from("k"), Value::Float(1.5))]);
        assert_eq!(m.to_string(), "{k: 1.5}");
    }

    #[test]
    fn test_type_error_display() {
        let err = TypeError::UnexpectedValue {
            expected: "u8",
            got: "String",
        };
        assert_eq!(err.to_string(), "Expected u8, got String value");
        assert_eq!(
            TypeError::MissingColumn("id".into()).to_string(),
            "No column named 'id'"
        );
    }
}
