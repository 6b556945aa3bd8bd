//! Row and cell input model
//!
//! A [`Row`] is an ordered list of named [`Cell`]s. Field order matters: it
//! decides the first-seen order of columns in the encoded spec.

use chrono::NaiveDate;
use serde_json::{Number, Value};

use crate::error::{AdapterError, AdapterResult};

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Any JSON value
    Value(Value),
    /// Calendar date, sent as `dd/mm/yyyy`
    Date(NaiveDate),
}

/// Runtime shape of a cell, one variant per column type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classified<'a> {
    Numeric(&'a Number),
    Text(&'a str),
    Date(NaiveDate),
    /// Objects, arrays, booleans and null
    Json(&'a Value),
}

/// Classify a cell by its shape.
pub fn classify(cell: &Cell) -> Classified<'_> {
    match cell {
        Cell::Date(date) => Classified::Date(*date),
        Cell::Value(Value::Number(n)) => Classified::Numeric(n),
        Cell::Value(Value::String(s)) => Classified::Text(s),
        Cell::Value(other) => Classified::Json(other),
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::Value(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(date: NaiveDate) -> Self {
        Cell::Date(date)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Value(Value::String(s))
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Value(Value::from(n))
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Value(Value::from(n))
    }
}

impl From<u64> for Cell {
    fn from(n: u64) -> Self {
        Cell::Value(Value::from(n))
    }
}

/// Non-finite floats have no JSON form and become `null`.
impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Value(Number::from_f64(n).map_or(Value::Null, Value::Number))
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Value(Value::Bool(b))
    }
}

/// One table row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Row { fields: Vec::new() }
    }

    /// Builder-style [`Row::insert`]
    pub fn with(mut self, name: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.insert(name, cell);
        self
    }

    /// Set a field. An existing field keeps its position and gets the new value.
    pub fn insert(&mut self, name: impl Into<String>, cell: impl Into<Cell>) {
        let name = name.into();
        let cell = cell.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = cell,
            None => self.fields.push((name, cell)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a row from a JSON object. `index` only feeds the error message.
    pub fn from_json(value: &Value, index: usize) -> AdapterResult<Self> {
        let Value::Object(map) = value else {
            return Err(AdapterError::Argument(format!(
                "Table row {index} is not an object"
            )));
        };
        Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Cell::Value(v.clone())))
            .collect())
    }
}

impl<K: Into<String>, C: Into<Cell>> FromIterator<(K, C)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, cell) in iter {
            row.insert(name, cell);
        }
        row
    }
}
