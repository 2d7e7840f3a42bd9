//! Raw row values captured during a table copy.
//!
//! The copier never interprets column types. Every non-null value is kept as
//! the bytes the server sent in the text protocol and bound back unchanged, so
//! the destination parses it with its own column type. NULL stays a distinct
//! marker and is never folded into an empty string.

use mysql_async::Value;

/// One column value of a copied row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// Textual representation as returned by the server.
    Raw(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Capture a driver value.
    ///
    /// Text-protocol results only ever yield `NULL` or `Bytes`; the other
    /// variants are rendered the way MySQL prints them so a value read over
    /// the binary protocol is captured identically.
    pub fn from_mysql(value: Value) -> Self {
        match value {
            Value::NULL => CellValue::Null,
            Value::Bytes(bytes) => CellValue::Raw(bytes),
            Value::Int(i) => CellValue::Raw(i.to_string().into_bytes()),
            Value::UInt(u) => CellValue::Raw(u.to_string().into_bytes()),
            Value::Float(f) => CellValue::Raw(f.to_string().into_bytes()),
            Value::Double(d) => CellValue::Raw(d.to_string().into_bytes()),
            Value::Date(year, month, day, hour, minute, second, micros) => {
                let mut text = format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                );
                if micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                CellValue::Raw(text.into_bytes())
            }
            Value::Time(negative, days, hours, minutes, seconds, micros) => {
                let total_hours = u32::from(hours) + days * 24;
                let mut text = format!(
                    "{}{:02}:{:02}:{:02}",
                    if negative { "-" } else { "" },
                    total_hours,
                    minutes,
                    seconds
                );
                if micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                CellValue::Raw(text.into_bytes())
            }
        }
    }

    /// Lossy UTF-8 text, `None` for NULL.
    pub fn into_text(self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Raw(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// Value bound as a statement parameter.
    pub fn to_param(&self) -> Value {
        match self {
            CellValue::Null => Value::NULL,
            CellValue::Raw(bytes) => Value::Bytes(bytes.clone()),
        }
    }
}

/// All rows read from one source table, in result order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBatch {
    /// Column names from the result metadata. Their order is the positional
    /// mapping onto the destination table.
    pub columns: Vec<String>,
    /// Positional rows, each exactly `columns.len()` wide.
    pub rows: Vec<Vec<CellValue>>,
}

impl RowBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row read from the driver.
    pub fn push_row(&mut self, values: Vec<Value>) {
        self.rows
            .push(values.into_iter().map(CellValue::from_mysql).collect());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flattened parameters for a slice of rows, row-major.
    pub fn params(rows: &[Vec<CellValue>]) -> Vec<Value> {
        rows.iter()
            .flat_map(|row| row.iter().map(CellValue::to_param))
            .collect()
    }
}
