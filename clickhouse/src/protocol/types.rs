//! ClickHouse type descriptors.
//!
//! A `Type` is parsed once per query (or per inserted batch) and is read-only
//! afterwards. Every consumer (encoder, decoder, literal encoder) matches on it
//! exhaustively, so a new variant has to be handled everywhere.
//!
//! Reference: https://clickhouse.com/docs/en/sql-reference/data-types

use std::fmt;
use std::str::FromStr;

use crate::error::TypeParseError;

/// Bit width of an `IntN` / `UIntN` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    W128,
    W256,
}

impl IntWidth {
    pub const ALL: [IntWidth; 6] = [
        IntWidth::W8,
        IntWidth::W16,
        IntWidth::W32,
        IntWidth::W64,
        IntWidth::W128,
        IntWidth::W256,
    ];

    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::W128 => 128,
            IntWidth::W256 => 256,
        }
    }

    /// Wire size in bytes.
    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.bits() == bits)
    }
}

/// Largest precision accepted by `Decimal(P, S)`.
pub const MAX_DECIMAL_PRECISION: u8 = 76;

/// Largest sub-second precision accepted by `DateTime64(P)`.
pub const MAX_DATETIME64_PRECISION: u8 = 9;

/// A ClickHouse column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int(IntWidth),
    UInt(IntWidth),
    Float32,
    Float64,
    Bool,
    String,
    FixedString(usize),
    Date,
    Date32,
    DateTime(Option<String>),
    DateTime64 {
        precision: u8,
        timezone: Option<String>,
    },
    /// `Decimal32..256(S)` normalize to the equivalent `Decimal(P, S)`.
    Decimal {
        precision: u8,
        scale: u8,
    },
    Uuid,
    Ipv4,
    Ipv6,
    Enum8(Vec<(String, i16)>),
    Enum16(Vec<(String, i16)>),
    Array(Box<Type>),
    Tuple(Vec<Type>),
    Map(Box<Type>, Box<Type>),
    Nullable(Box<Type>),
    LowCardinality(Box<Type>),
    SimpleAggregateFunction(String, Box<Type>),
}

impl Type {
    /// Parse a type descriptor, e.g. `Array(Nullable(String))`.
    pub fn parse(input: &str) -> Result<Type, TypeParseError> {
        super::type_parser::parse_type(input)
    }

    pub fn nullable(inner: Type) -> Type {
        Type::Nullable(Box::new(inner))
    }

    pub fn array(inner: Type) -> Type {
        Type::Array(Box::new(inner))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn low_cardinality(inner: Type) -> Type {
        Type::LowCardinality(Box::new(inner))
    }

    /// Storage width of the mantissa for a decimal of the given precision.
    pub fn decimal_width(precision: u8) -> IntWidth {
        match precision {
            0..=9 => IntWidth::W32,
            10..=18 => IntWidth::W64,
            19..=38 => IntWidth::W128,
            _ => IntWidth::W256,
        }
    }

    /// Strip wrappers that do not change the row-level encoding.
    pub fn storage(&self) -> &Type {
        match self {
            Type::LowCardinality(inner) | Type::SimpleAggregateFunction(_, inner) => {
                inner.storage()
            }
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.storage(), Type::Nullable(_))
    }

    /// Exact RowBinary size of a non-null value, for fixed-width types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self.storage() {
            Type::Int(w) | Type::UInt(w) => Some(w.bytes()),
            Type::Float32 => Some(4),
            Type::Float64 => Some(8),
            Type::Bool => Some(1),
            Type::FixedString(n) => Some(*n),
            Type::Date => Some(2),
            Type::Date32 | Type::DateTime(_) | Type::Ipv4 => Some(4),
            Type::DateTime64 { .. } => Some(8),
            Type::Decimal { precision, .. } => Some(Type::decimal_width(*precision).bytes()),
            Type::Uuid | Type::Ipv6 => Some(16),
            Type::Enum8(_) => Some(1),
            Type::Enum16(_) => Some(2),
            Type::Tuple(items) => items.iter().map(Type::fixed_size).sum(),
            Type::String
            | Type::Array(_)
            | Type::Map(..)
            | Type::Nullable(_)
            | Type::LowCardinality(_)
            | Type::SimpleAggregateFunction(..) => None,
        }
    }
}

impl FromStr for Type {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::parse(s)
    }
}

/// Write a single-quoted string literal as the server prints it.
pub(crate) fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('\'')
}

fn write_enum(f: &mut fmt::Formatter<'_>, name: &str, items: &[(String, i16)]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, (label, code)) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_quoted(f, label)?;
        write!(f, " = {}", code)?;
    }
    f.write_str(")")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(w) => write!(f, "Int{}", w.bits()),
            Type::UInt(w) => write!(f, "UInt{}", w.bits()),
            Type::Float32 => f.write_str("Float32"),
            Type::Float64 => f.write_str("Float64"),
            Type::Bool => f.write_str("Bool"),
            Type::String => f.write_str("String"),
            Type::FixedString(n) => write!(f, "FixedString({})", n),
            Type::Date => f.write_str("Date"),
            Type::Date32 => f.write_str("Date32"),
            Type::DateTime(None) => f.write_str("DateTime"),
            Type::DateTime(Some(tz)) => {
                f.write_str("DateTime(")?;
                write_quoted(f, tz)?;
                f.write_str(")")
            }
            Type::DateTime64 {
                precision,
                timezone,
            } => {
                write!(f, "DateTime64({}", precision)?;
                if let Some(tz) = timezone {
                    f.write_str(", ")?;
                    write_quoted(f, tz)?;
                }
                f.write_str(")")
            }
            Type::Decimal { precision, scale } => write!(f, "Decimal({}, {})", precision, scale),
            Type::Uuid => f.write_str("UUID"),
            Type::Ipv4 => f.write_str("IPv4"),
            Type::Ipv6 => f.write_str("IPv6"),
            Type::Enum8(items) => write_enum(f, "Enum8", items),
            Type::Enum16(items) => write_enum(f, "Enum16", items),
            Type::Array(inner) => write!(f, "Array({})", inner),
            Type::Tuple(items) => {
                f.write_str("Tuple(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Type::Map(k, v) => write!(f, "Map({}, {})", k, v),
            Type::Nullable(inner) => write!(f, "Nullable({})", inner),
            Type::LowCardinality(inner) => write!(f, "LowCardinality({})", inner),
            Type::SimpleAggregateFunction(func, inner) => {
                write!(f, "SimpleAggregateFunction({}, {})", func, inner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_width_table() {
        for w in IntWidth::ALL {
            assert_eq!(IntWidth::from_bits(w.bits()), Some(w));
            assert_eq!(w.bytes() * 8, w.bits() as usize);
        }
        assert_eq!(IntWidth::from_bits(24), None);
    }

    #[test]
    fn test_display_canonical() {
        let ty = Type::nullable(Type::DateTime64 {
            precision: 3,
            timezone: Some("UTC".into()),
        });
        assert_eq!(ty.to_string(), "Nullable(DateTime64(3, 'UTC'))");

        let ty = Type::Enum8(vec![("a'b".into(), 1), ("c".into(), -2)]);
        assert_eq!(ty.to_string(), "Enum8('a\\'b' = 1, 'c' = -2)");

        let ty = Type::Tuple(vec![Type::UInt(IntWidth::W8), Type::array(Type::String)]);
        assert_eq!(ty.to_string(), "Tuple(UInt8, Array(String))");
    }

    #[test]
    fn test_decimal_width() {
        assert_eq!(Type::decimal_width(9), IntWidth::W32);
        assert_eq!(Type::decimal_width(10), IntWidth::W64);
        assert_eq!(Type::decimal_width(18), IntWidth::W64);
        assert_eq!(Type::decimal_width(38), IntWidth::W128);
        assert_eq!(Type::decimal_width(76), IntWidth::W256);
    }

    #[test]
    fn test_fixed_size() {
        assert_eq!(Type::Int(IntWidth::W32).fixed_size(), Some(4));
        assert_eq!(Type::Decimal { precision: 18, scale: 4 }.fixed_size(), Some(8));
        assert_eq!(Type::low_cardinality(Type::Uuid).fixed_size(), Some(16));
        assert_eq!(
            Type::Tuple(vec![Type::Date, Type::Ipv4]).fixed_size(),
            Some(6)
        );
        assert_eq!(Type::String.fixed_size(), None);
        assert_eq!(Type::nullable(Type::Date).fixed_size(), None);
    }
}
