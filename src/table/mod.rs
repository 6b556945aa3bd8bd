//! Table Encoding
//!
//! The service accepts parameters only as length-bounded text fragments, so a
//! table is sent as one column spec plus any number of size-bounded chunks:
//!
//! ```text
//! rows ──► classify each field ──► column registry (first-seen order)
//!                │
//!                └──► encoded row + cost ──► chunk 0 │ chunk 1 │ ...
//! ```
//!
//! - Every column gets a type on first sighting. A later field of the same
//!   name with a different type aborts the whole encoding.
//! - The cost of a row is `Σ (6 + key length + encoded value length)`, an
//!   estimate of its size in the wire form.
//! - A chunk never holds more than `threshold` cost units. Rows are never
//!   split; a row that does not fit starts the next chunk.
//!
//! ## Example
//!
//! ```rust
//! use storedproc::table::{Row, TableEncoder};
//!
//! let rows = vec![
//!     Row::new().with("id", 1).with("name", "Ada Lovelace"),
//!     Row::new().with("id", 2).with("name", ""),
//! ];
//! let table = TableEncoder::new().encode(&rows).unwrap();
//! assert_eq!(table.spec.len(), 2);
//! assert_eq!(table.chunks.len(), 1);
//! ```

mod cell;

pub use cell::{classify, Cell, Classified, Row};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{AdapterError, AdapterResult};

/// Maximum cost of one chunk, just under the service's 32k parameter limit
pub const CHUNK_THRESHOLD: usize = 32_000;

/// Per-field wire overhead used in the cost estimate
pub const FIELD_OVERHEAD: usize = 6;

/// Declared width of numeric and date columns
pub const FIXED_WIDTH: usize = 8;

/// Format of date cells on the wire
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Column type as named on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "num")]
    Numeric,
    #[serde(rename = "string")]
    Text,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "json")]
    Json,
}

/// One column of the table spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "colName")]
    pub name: String,
    #[serde(rename = "colType")]
    pub col_type: ColumnType,
    /// Largest declared length seen for this column, at least 1
    #[serde(rename = "colLength")]
    pub length: usize,
}

/// A size-bounded block of encoded rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableChunk {
    pub rows: Vec<Map<String, Value>>,
    /// Accumulated cost of `rows`
    pub size: usize,
}

impl TableChunk {
    fn push(&mut self, row: Map<String, Value>, cost: usize) {
        self.rows.push(row);
        self.size += cost;
    }
}

/// Column spec plus ordered chunks, ready for [`crate::request::RequestBuilder`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedTable {
    pub spec: Vec<ColumnSpec>,
    pub chunks: Vec<TableChunk>,
}

impl EncodedTable {
    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(|c| c.rows.len()).sum()
    }

    /// Wire form: `[JSON(spec), JSON(chunk0), JSON(chunk1), ...]`
    pub fn to_params(&self) -> AdapterResult<Vec<String>> {
        let mut params = Vec::with_capacity(self.chunks.len() + 1);
        params.push(serde_json::to_string(&self.spec)?);
        for chunk in &self.chunks {
            params.push(serde_json::to_string(&chunk.rows)?);
        }
        Ok(params)
    }

    /// Undo the value escaping of every chunk, in row order.
    ///
    /// Dates stay in their wire format and empty strings come back as a
    /// single space.
    pub fn decode_rows(&self) -> AdapterResult<Vec<Map<String, Value>>> {
        let types: HashMap<&str, ColumnType> = self
            .spec
            .iter()
            .map(|c| (c.name.as_str(), c.col_type))
            .collect();

        let mut rows = Vec::with_capacity(self.row_count());
        for row in self.chunks.iter().flat_map(|c| c.rows.iter()) {
            let mut decoded = Map::new();
            for (name, value) in row {
                let value = match (types.get(name.as_str()), value) {
                    (Some(ColumnType::Text), Value::String(s)) => {
                        Value::String(unescape(s)?)
                    }
                    (Some(ColumnType::Json), Value::String(s)) => {
                        serde_json::from_str(&unescape(s)?)?
                    }
                    _ => value.clone(),
                };
                decoded.insert(name.clone(), value);
            }
            rows.push(decoded);
        }
        Ok(rows)
    }
}

/// Percent-escape a text value for transmission
pub fn escape(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Reverse of [`escape`]. Text without `%` sequences comes back unchanged.
pub fn unescape(encoded: &str) -> AdapterResult<String> {
    urlencoding::decode(encoded)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| AdapterError::Parse(format!("invalid escaped value '{encoded}': {e}")))
}

/// Result of encoding one field
#[derive(Debug, Clone, PartialEq)]
struct EncodedField {
    col_type: ColumnType,
    declared_length: usize,
    value: Value,
    encoded_length: usize,
}

fn encode_cell(cell: &Cell) -> EncodedField {
    match classify(cell) {
        Classified::Numeric(n) => EncodedField {
            col_type: ColumnType::Numeric,
            declared_length: FIXED_WIDTH,
            encoded_length: n.to_string().len(),
            value: Value::Number(n.clone()),
        },
        Classified::Text(s) => {
            // The service collapses empty strings to missing values
            let encoded = if s.is_empty() {
                " ".to_string()
            } else {
                escape(s)
            };
            EncodedField {
                col_type: ColumnType::Text,
                declared_length: s.chars().count(),
                encoded_length: encoded.len(),
                value: Value::String(encoded),
            }
        }
        Classified::Date(date) => {
            let formatted = date.format(DATE_FORMAT).to_string();
            EncodedField {
                col_type: ColumnType::Date,
                declared_length: FIXED_WIDTH,
                encoded_length: formatted.len(),
                value: Value::String(formatted),
            }
        }
        Classified::Json(v) => {
            let raw = v.to_string();
            let encoded = escape(&raw);
            EncodedField {
                col_type: ColumnType::Json,
                declared_length: raw.chars().count(),
                encoded_length: encoded.len(),
                value: Value::String(encoded),
            }
        }
    }
}

/// Column specs keyed by name, in first-seen order
#[derive(Debug, Default)]
struct ColumnRegistry {
    columns: Vec<ColumnSpec>,
    index: HashMap<String, usize>,
}

impl ColumnRegistry {
    fn observe(&mut self, name: &str, col_type: ColumnType, length: usize) -> AdapterResult<()> {
        let length = length.max(1);
        match self.index.get(name) {
            None => {
                self.index.insert(name.to_string(), self.columns.len());
                self.columns.push(ColumnSpec {
                    name: name.to_string(),
                    col_type,
                    length,
                });
                Ok(())
            }
            Some(&i) => {
                let column = &mut self.columns[i];
                if column.col_type != col_type {
                    return Err(AdapterError::Type(format!(
                        "There is a type mismatch in the array between elements (columns) of the same name: \
                         '{name}' is {:?} and {col_type:?}",
                        column.col_type
                    )));
                }
                column.length = column.length.max(length);
                Ok(())
            }
        }
    }
}

/// Converts rows into a column spec and size-bounded chunks
#[derive(Debug, Clone, Copy)]
pub struct TableEncoder {
    threshold: usize,
}

impl TableEncoder {
    pub fn new() -> Self {
        TableEncoder {
            threshold: CHUNK_THRESHOLD,
        }
    }

    /// Encoder with a custom chunk threshold (cost units)
    pub fn with_threshold(threshold: usize) -> Self {
        TableEncoder { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Encode typed rows.
    ///
    /// Zero rows give an empty spec and no chunks. A row whose own cost is
    /// above the threshold is an argument error, since it can never be sent.
    pub fn encode(&self, rows: &[Row]) -> AdapterResult<EncodedTable> {
        let mut registry = ColumnRegistry::default();
        let mut chunks = Vec::new();
        let mut current = TableChunk::default();

        for (i, row) in rows.iter().enumerate() {
            let mut encoded_row = Map::new();
            let mut cost = 0;

            for (name, cell) in row.iter() {
                let field = encode_cell(cell);
                registry.observe(name, field.col_type, field.declared_length)?;
                cost += FIELD_OVERHEAD + name.chars().count() + field.encoded_length;
                encoded_row.insert(name.to_string(), field.value);
            }

            if cost > self.threshold {
                return Err(AdapterError::Argument(format!(
                    "Table row {i} costs {cost}, above the chunk threshold of {}",
                    self.threshold
                )));
            }

            if current.size + cost > self.threshold {
                chunks.push(std::mem::take(&mut current));
            }
            current.push(encoded_row, cost);
        }

        if !current.rows.is_empty() {
            chunks.push(current);
        }

        tracing::debug!(
            rows = rows.len(),
            columns = registry.columns.len(),
            chunks = chunks.len(),
            "table_encoded"
        );

        Ok(EncodedTable {
            spec: registry.columns,
            chunks,
        })
    }

    /// Encode a JSON array of objects.
    pub fn encode_json(&self, table: &Value) -> AdapterResult<EncodedTable> {
        let Value::Array(items) = table else {
            return Err(AdapterError::Argument(
                "The table is not an array of rows".to_string(),
            ));
        };
        let rows = items
            .iter()
            .enumerate()
            .map(|(i, item)| Row::from_json(item, i))
            .collect::<AdapterResult<Vec<_>>>()?;
        self.encode(&rows)
    }
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new()
    }
}
