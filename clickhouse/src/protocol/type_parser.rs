//! Recursive-descent parser for type descriptors.
//!
//! Accepts everything `Type`'s `Display` prints plus the spellings the server
//! emits in `RowBinaryWithNamesAndTypes` headers: `Decimal32(S)` aliases,
//! whitespace between tokens and named tuple elements.

use std::borrow::Cow;
use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{cut, opt, recognize},
    error::{ErrorKind, ParseError},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, preceded},
};

use super::types::{IntWidth, MAX_DATETIME64_PRECISION, MAX_DECIMAL_PRECISION, Type};
use crate::error::TypeParseError;

#[derive(Debug)]
struct SyntaxError<'a> {
    input: &'a str,
    message: Cow<'static, str>,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            input,
            message: message.into(),
        }
    }
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxError::new(input, format!("unexpected input ({:?})", kind))
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: &'a str, c: char) -> Self {
        SyntaxError::new(input, format!("expected '{}'", c))
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

/// Deepest nesting of parameterized types accepted.
pub const MAX_TYPE_DEPTH: usize = 64;

fn fail<T>(input: &str, message: impl Into<Cow<'static, str>>) -> PResult<'_, T> {
    Err(nom::Err::Failure(SyntaxError::new(input, message)))
}

/// Parse a complete type descriptor.
pub fn parse_type(input: &str) -> Result<Type, TypeParseError> {
    match (ty, multispace0).parse(input) {
        Ok(("", (t, _))) => Ok(t),
        Ok((rest, _)) => Err(TypeParseError::new(
            input,
            input.len() - rest.len(),
            format!("unexpected trailing input '{}'", rest),
        )),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(TypeParseError::new(
            input,
            input.len() - e.input.len(),
            e.message,
        )),
        Err(nom::Err::Incomplete(_)) => Err(TypeParseError::new(
            input,
            input.len(),
            "unexpected end of input",
        )),
    }
}

fn ws<'a, O>(
    inner: impl Parser<&'a str, Output = O, Error = SyntaxError<'a>>,
) -> impl Parser<&'a str, Output = O, Error = SyntaxError<'a>> {
    delimited(multispace0, inner, multispace0)
}

/// `( inner )`. Once the name is known, a malformed argument list is fatal.
fn args<'a, O>(
    inner: impl Parser<&'a str, Output = O, Error = SyntaxError<'a>>,
) -> impl Parser<&'a str, Output = O, Error = SyntaxError<'a>> {
    delimited(cut(ws(char('('))), cut(inner), cut(ws(char(')'))))
}

fn identifier(input: &str) -> PResult<'_, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

fn number<T: FromStr>(input: &str) -> PResult<'_, T> {
    let (input, _) = multispace0(input)?;
    let (rest, digits) = recognize((opt(char('-')), digit1)).parse(input)?;
    match digits.parse::<T>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => fail(input, format!("number {} out of range", digits)),
    }
}

/// Single-quoted literal with `\'` and `\\` escapes.
fn quoted(input: &str) -> PResult<'_, String> {
    let (input, _) = preceded(multispace0, char('\'')).parse(input)?;
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => return Ok((&input[i + 1..], out)),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c => out.push(c),
        }
    }
    fail(&input[input.len()..], "unterminated string literal")
}

fn enum_items(input: &str) -> PResult<'_, Vec<(String, i16)>> {
    separated_list1(
        ws(char(',')),
        (quoted, cut(ws(char('='))), cut(number::<i16>)),
    )
    .map(|items| {
        items
            .into_iter()
            .map(|(label, _, code)| (label, code))
            .collect()
    })
    .parse(input)
}

fn tuple_element(input: &str, depth: usize) -> PResult<'_, Type> {
    let named = (
        preceded(multispace0, identifier),
        multispace1,
        |i| nested(i, depth),
    )
        .map(|(_, _, t)| t);
    alt((named, |i| nested(i, depth))).parse(input)
}

fn int_width(name: &str, prefix: &str) -> Option<IntWidth> {
    name.strip_prefix(prefix)?
        .parse()
        .ok()
        .and_then(IntWidth::from_bits)
}

fn decimal(input: &str, precision: u8, scale: u8) -> PResult<'_, Type> {
    if !(1..=MAX_DECIMAL_PRECISION).contains(&precision) {
        return fail(
            input,
            format!(
                "decimal precision {} outside 1..={}",
                precision, MAX_DECIMAL_PRECISION
            ),
        );
    }
    if scale > precision {
        return fail(
            input,
            format!("decimal scale {} exceeds precision {}", scale, precision),
        );
    }
    Ok((input, Type::Decimal { precision, scale }))
}

fn ty(input: &str) -> PResult<'_, Type> {
    nested(input, 0)
}

/// `depth` counts enclosing parameterized types.
fn nested(input: &str, depth: usize) -> PResult<'_, Type> {
    let (input, _) = multispace0(input)?;
    if depth > MAX_TYPE_DEPTH {
        return fail(
            input,
            format!("type nested deeper than {} levels", MAX_TYPE_DEPTH),
        );
    }
    let inner = |i| nested(i, depth + 1);
    let (rest, name) = identifier(input)
        .map_err(|_| nom::Err::Error(SyntaxError::new(input, "expected type name")))?;

    let simple = match name {
        "Float32" => Some(Type::Float32),
        "Float64" => Some(Type::Float64),
        "Bool" | "Boolean" => Some(Type::Bool),
        "String" => Some(Type::String),
        "Date" => Some(Type::Date),
        "Date32" => Some(Type::Date32),
        "UUID" => Some(Type::Uuid),
        "IPv4" => Some(Type::Ipv4),
        "IPv6" => Some(Type::Ipv6),
        _ => None,
    };
    if let Some(t) = simple {
        return Ok((rest, t));
    }
    if let Some(w) = int_width(name, "UInt") {
        return Ok((rest, Type::UInt(w)));
    }
    if let Some(w) = int_width(name, "Int") {
        return Ok((rest, Type::Int(w)));
    }

    match name {
        "FixedString" => {
            let (rest, n) = args(number::<usize>).parse(rest)?;
            if n == 0 {
                return fail(input, "FixedString size must be positive");
            }
            Ok((rest, Type::FixedString(n)))
        }
        "DateTime" => {
            let (rest, tz) =
                opt(delimited(ws(char('(')), cut(quoted), cut(ws(char(')'))))).parse(rest)?;
            Ok((rest, Type::DateTime(tz)))
        }
        "DateTime64" => {
            let (rest, (precision, timezone)) =
                args((number::<u8>, opt(preceded(ws(char(',')), cut(quoted))))).parse(rest)?;
            if precision > MAX_DATETIME64_PRECISION {
                return fail(
                    input,
                    format!(
                        "DateTime64 precision {} exceeds {}",
                        precision, MAX_DATETIME64_PRECISION
                    ),
                );
            }
            Ok((
                rest,
                Type::DateTime64 {
                    precision,
                    timezone,
                },
            ))
        }
        "Decimal" => {
            let (rest, (precision, scale)) =
                args((number::<u8>, opt(preceded(ws(char(',')), cut(number::<u8>)))))
                    .parse(rest)?;
            decimal(input, precision, scale.unwrap_or(0)).map(|(_, t)| (rest, t))
        }
        "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
            let precision = match name {
                "Decimal32" => 9,
                "Decimal64" => 18,
                "Decimal128" => 38,
                _ => 76,
            };
            let (rest, scale) = args(number::<u8>).parse(rest)?;
            decimal(input, precision, scale).map(|(_, t)| (rest, t))
        }
        "Enum8" => {
            let (rest, items) = args(enum_items).parse(rest)?;
            if let Some((label, code)) = items.iter().find(|(_, c)| i8::try_from(*c).is_err()) {
                return fail(
                    input,
                    format!("Enum8 code {} for '{}' outside Int8 range", code, label),
                );
            }
            Ok((rest, Type::Enum8(items)))
        }
        "Enum16" => {
            let (rest, items) = args(enum_items).parse(rest)?;
            Ok((rest, Type::Enum16(items)))
        }
        "Array" => {
            let (rest, t) = args(inner).parse(rest)?;
            Ok((rest, Type::array(t)))
        }
        "Nullable" => {
            let (rest, t) = args(inner).parse(rest)?;
            Ok((rest, Type::nullable(t)))
        }
        "LowCardinality" => {
            let (rest, t) = args(inner).parse(rest)?;
            Ok((rest, Type::low_cardinality(t)))
        }
        "Tuple" => {
            let (rest, items) = args(separated_list0(ws(char(',')), |i| {
                tuple_element(i, depth + 1)
            })).parse(rest)?;
            Ok((rest, Type::Tuple(items)))
        }
        "Map" => {
            let (rest, (k, _, v)) = args((inner, ws(char(',')), cut(inner))).parse(rest)?;
            Ok((rest, Type::map(k, v)))
        }
        "SimpleAggregateFunction" => {
            let (rest, (func, _, t)) =
                args((ws(identifier), ws(char(',')), cut(inner))).parse(rest)?;
            Ok((
                rest,
                Type::SimpleAggregateFunction(func.to_string(), Box::new(t)),
            ))
        }
        _ => fail(input, format!("unknown type '{}'", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Type {
        parse_type(s).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("UInt8"), Type::UInt(IntWidth::W8));
        assert_eq!(parse("Int256"), Type::Int(IntWidth::W256));
        assert_eq!(parse("Float64"), Type::Float64);
        assert_eq!(parse("  String  "), Type::String);
        assert_eq!(parse("FixedString(16)"), Type::FixedString(16));
        assert_eq!(parse("UUID"), Type::Uuid);
        assert_eq!(parse("Boolean"), Type::Bool);
    }

    #[test]
    fn test_datetime() {
        assert_eq!(parse("DateTime"), Type::DateTime(None));
        assert_eq!(parse("DateTime('Europe/Berlin')"), Type::DateTime(Some("Europe/Berlin".into())));
        assert_eq!(
            parse("DateTime64(3, 'UTC')"),
            Type::DateTime64 {
                precision: 3,
                timezone: Some("UTC".into())
            }
        );
        assert_eq!(
            parse("DateTime64(6)"),
            Type::DateTime64 {
                precision: 6,
                timezone: None
            }
        );
    }

    #[test]
    fn test_decimal_aliases() {
        assert_eq!(parse("Decimal(18,4)"), Type::Decimal { precision: 18, scale: 4 });
        assert_eq!(parse("Decimal(10)"), Type::Decimal { precision: 10, scale: 0 });
        assert_eq!(parse("Decimal32(2)"), Type::Decimal { precision: 9, scale: 2 });
        assert_eq!(parse("Decimal256(10)"), Type::Decimal { precision: 76, scale: 10 });
    }

    #[test]
    fn test_nested() {
        assert_eq!(
            parse("Array(Nullable(String))"),
            Type::array(Type::nullable(Type::String))
        );
        assert_eq!(
            parse("Map(LowCardinality(String), Array(UInt64))"),
            Type::map(
                Type::low_cardinality(Type::String),
                Type::array(Type::UInt(IntWidth::W64))
            )
        );
        assert_eq!(
            parse("SimpleAggregateFunction(sum, UInt64)"),
            Type::SimpleAggregateFunction("sum".into(), Box::new(Type::UInt(IntWidth::W64)))
        );
    }

    #[test]
    fn test_tuple_named_and_plain() {
        let expected = Type::Tuple(vec![Type::UInt(IntWidth::W8), Type::String]);
        assert_eq!(parse("Tuple(UInt8, String)"), expected);
        assert_eq!(parse("Tuple(a UInt8, b String)"), expected);
        assert_eq!(parse("Tuple(UInt8 , String)"), expected);
        assert_eq!(parse("Tuple()"), Type::Tuple(vec![]));
    }

    #[test]
    fn test_enum() {
        assert_eq!(
            parse("Enum8('a' = 1, 'it\\'s' = -2)"),
            Type::Enum8(vec![("a".into(), 1), ("it's".into(), -2)])
        );
        assert_eq!(
            parse("Enum16('big' = 1000)"),
            Type::Enum16(vec![("big".into(), 1000)])
        );
    }

    #[test]
    fn test_display_round_trip() {
        for s in [
            "Nullable(DateTime64(3, 'UTC'))",
            "Array(Tuple(UInt8, Array(String)))",
            "Map(String, Decimal(38, 10))",
            "Enum8('a\\'b' = 1, 'c' = 2)",
            "LowCardinality(Nullable(FixedString(4)))",
            "SimpleAggregateFunction(anyLast, IPv6)",
            "DateTime('Asia/Tokyo')",
            "Tuple()",
        ] {
            let t = parse(s);
            assert_eq!(t.to_string(), s);
            assert_eq!(parse(&t.to_string()), t);
        }
    }

    #[test]
    fn test_errors_carry_position() {
        let err = parse_type("Array(").unwrap_err();
        assert_eq!(err.position, 6);
        assert_eq!(err.message, "expected type name");

        let err = parse_type("Nullable(Strin)").unwrap_err();
        assert_eq!(err.position, 9);
        assert!(err.message.contains("unknown type 'Strin'"));

        let err = parse_type("Array(String").unwrap_err();
        assert_eq!(err.position, 12);
        assert_eq!(err.message, "expected ')'");

        let err = parse_type("String)").unwrap_err();
        assert_eq!(err.position, 6);
    }

    #[test]
    fn test_semantic_errors() {
        assert!(parse_type("Decimal(77, 2)").is_err());
        assert!(parse_type("Decimal(4, 5)").is_err());
        assert!(parse_type("DateTime64(10)").is_err());
        assert!(parse_type("FixedString(0)").is_err());
        assert!(parse_type("FixedString(x)").is_err());
        assert!(parse_type("Enum8('a' = 300)").is_err());
        assert!(parse_type("Int24").is_err());
        assert!(parse_type("").is_err());
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let deep = |n: usize| format!("{}UInt8{}", "Array(".repeat(n), ")".repeat(n));

        let t = parse(&deep(MAX_TYPE_DEPTH));
        assert_eq!(t.to_string(), deep(MAX_TYPE_DEPTH));

        let err = parse_type(&deep(MAX_TYPE_DEPTH + 1)).unwrap_err();
        assert_eq!(err.position, 6 * (MAX_TYPE_DEPTH + 1));
        assert!(err.message.contains("nested deeper"));

        let err = parse_type(&deep(200_000)).unwrap_err();
        assert!(err.message.contains("nested deeper"));

        let tuples = format!("{}UInt8{}", "Tuple(a ".repeat(100), ")".repeat(100));
        assert!(parse_type(&tuples).is_err());
    }
}
