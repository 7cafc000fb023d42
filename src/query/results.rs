//! Query result containers.

use super::value::Value;
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::ops::Index;
use std::sync::Arc;

/// Result of executing a query.
///
/// `SELECT *` and single-column projections produce a [`ResultSet`];
/// projections with two or more columns produce a [`StructSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectResults {
    ResultSet(ResultSet),
    StructSet(StructSet),
}

impl SelectResults {
    /// Number of rows.
    pub fn size(&self) -> usize {
        match self {
            SelectResults::ResultSet(rs) => rs.size(),
            SelectResults::StructSet(ss) => ss.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn as_result_set(&self) -> Option<&ResultSet> {
        match self {
            SelectResults::ResultSet(rs) => Some(rs),
            SelectResults::StructSet(_) => None,
        }
    }

    pub fn as_struct_set(&self) -> Option<&StructSet> {
        match self {
            SelectResults::StructSet(ss) => Some(ss),
            SelectResults::ResultSet(_) => None,
        }
    }

    /// Rows as plain values; struct rows become objects.
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            SelectResults::ResultSet(rs) => rs.rows.clone(),
            SelectResults::StructSet(ss) => ss.iter().map(Struct::to_value).collect(),
        }
    }

    /// Deserialize every row into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeserializationError` if a row does not fit `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.to_values()
            .iter()
            .map(|row| row.deserialize_into::<T>())
            .collect()
    }
}

impl From<ResultSet> for SelectResults {
    fn from(rs: ResultSet) -> Self {
        SelectResults::ResultSet(rs)
    }
}

impl From<StructSet> for SelectResults {
    fn from(ss: StructSet) -> Self {
        SelectResults::StructSet(ss)
    }
}

/// Rows of a `SELECT *` or single-column query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Value>,
}

impl ResultSet {
    pub(crate) fn new(rows: Vec<Value>) -> Self {
        ResultSet { rows }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Rows of a multi-column projection. All rows share one set of field names.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSet {
    field_names: Arc<[String]>,
    rows: Vec<Struct>,
}

impl StructSet {
    pub(crate) fn new(field_names: Arc<[String]>, rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| Struct {
                field_names: Arc::clone(&field_names),
                values,
            })
            .collect();
        StructSet { field_names, rows }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.field_names.get(index).map(String::as_str)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|n| n == name)
    }

    pub fn get(&self, index: usize) -> Option<&Struct> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Struct> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a StructSet {
    type Item = &'a Struct;
    type IntoIter = std::slice::Iter<'a, Struct>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// One row of a [`StructSet`]: values addressed by position or field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    field_names: Arc<[String]>,
    values: Vec<Value>,
}

impl Struct {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.field_names.get(index).map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.field_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterate `(field name, value)` pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.field_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }
}

impl Index<usize> for Struct {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}
