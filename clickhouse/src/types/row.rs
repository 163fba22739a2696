//! Decoded rows and typed row mapping.

use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use super::{FromValue, TypeError, Value};
use crate::protocol::types::Type;

/// Column metadata shared by every row of one result.
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    pub names: Vec<String>,
    pub types: Vec<Type>,
    pub name_to_index: HashMap<String, usize>,
}

impl Columns {
    pub fn new(names: Vec<String>, types: Vec<Type>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            types,
            name_to_index,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// One result row. Positional; names are available when the response
/// carried a `RowBinaryWithNamesAndTypes` header.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Option<Arc<Columns>>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            columns: None,
        }
    }

    pub fn with_columns(values: Vec<Value>, columns: Arc<Columns>) -> Self {
        Self {
            values,
            columns: Some(columns),
        }
    }

    pub fn columns(&self) -> Option<&Columns> {
        self.columns.as_deref()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.as_ref()?.index_of(name)?;
        self.values.get(idx)
    }

    /// Convert column `idx` into a Rust type.
    pub fn try_get<T: FromValue>(&self, idx: usize) -> Result<T, TypeError> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| TypeError::MissingColumn(format!("#{}", idx)))?;
        T::from_value(value.clone())
    }

    pub fn try_get_by_name<T: FromValue>(&self, name: &str) -> Result<T, TypeError> {
        let value = self
            .get_by_name(name)
            .ok_or_else(|| TypeError::MissingColumn(name.to_string()))?;
        T::from_value(value.clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl AsRef<[Value]> for Row {
    fn as_ref(&self) -> &[Value] {
        &self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        &self.values[idx]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Trait for structs that map to a table row.
///
/// ```ignore
/// impl ChRow for Event {
///     fn columns() -> &'static [&'static str] {
///         &["id", "name", "at"]
///     }
///
///     fn types() -> Vec<Type> {
///         vec![u64::ch_type(), String::ch_type(), Type::DateTime64 { precision: 3, timezone: None }]
///     }
///
///     fn to_values(&self) -> Vec<Value> {
///         vec![self.id.to_value(), self.name.to_value(), self.at.to_value()]
///     }
///
///     fn from_row(row: &Row) -> Result<Self, TypeError> {
///         Ok(Event { id: row.try_get(0)?, name: row.try_get(1)?, at: row.try_get(2)? })
///     }
/// }
///
/// driver.insert_rows("events", &events).await?;
/// let events: Vec<Event> = driver.fetch_all("SELECT id, name, at FROM events").await?;
/// ```
pub trait ChRow: Sized {
    /// Column names in the order `to_values` produces them.
    fn columns() -> &'static [&'static str];

    /// Column types, one per entry of `columns()`.
    fn types() -> Vec<Type>;

    fn to_values(&self) -> Vec<Value>;

    /// Construct from a decoded row. Indices follow `columns()`.
    fn from_row(row: &Row) -> Result<Self, TypeError>;

    /// `SELECT` list for `columns()`.
    fn select_list() -> String {
        Self::columns().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns = Arc::new(Columns::new(
            vec!["id".into(), "name".into()],
            vec![Type::UInt(crate::protocol::types::IntWidth::W32), Type::String],
        ));
        Row::with_columns(vec![Value::UInt(7), Value::from("ada")], columns)
    }

    #[test]
    fn test_row_access() {
        let row = sample();
        assert_eq!(row.len(), 2);
        assert_eq!(row[0], Value::UInt(7));
        assert_eq!(row.get_by_name("name"), Some(&Value::from("ada")));
        assert_eq!(row.try_get::<u32>(0).unwrap(), 7);
        assert_eq!(row.try_get_by_name::<String>("name").unwrap(), "ada");
        assert_eq!(
            row.try_get_by_name::<String>("email"),
            Err(TypeError::MissingColumn("email".into()))
        );
        assert!(row.try_get::<u32>(5).is_err());
    }

    #[test]
    fn test_row_without_columns() {
        let row = Row::new(vec![Value::Null]);
        assert!(row.columns().is_none());
        assert_eq!(row.get_by_name("x"), None);
        assert_eq!(row.try_get::<Option<i64>>(0).unwrap(), None);
    }
}
