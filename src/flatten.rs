//! Reduce Elasticsearch documents to flat rows.
//!
//! Scalars keep their JSON type; objects and arrays become their JSON text so
//! every value fits an integer, floating point or text column.

use log::debug;
use serde_json::Value;

use crate::source::Hit;

/// Column holding the document identifier, always the primary key
pub const ID_COLUMN: &str = "id";

/// A single flattened value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    /// JSON text of an object or array
    Nested(String),
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if n.is_u64() {
                    // Beyond i64, keep the exact digits
                    FieldValue::Text(n.to_string())
                } else {
                    n.as_f64()
                        .map(FieldValue::Float)
                        .unwrap_or_else(|| FieldValue::Text(n.to_string()))
                }
            }
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => FieldValue::Nested(value.to_string()),
        }
    }

    /// Short name of the value kind, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Nested(_) => "nested",
        }
    }

    /// Text form used for identifiers and log messages
    pub fn to_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Text(s) | FieldValue::Nested(s) => Some(s.clone()),
        }
    }
}

/// A document as an ordered list of column values
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    id: String,
    values: Vec<(String, FieldValue)>,
}

impl FlatRow {
    /// The primary key value
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Columns and values in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Flatten one document.
///
/// A payload `id` field is kept in place and stored as text; when it is
/// missing or null the Elasticsearch `_id` fills it, appended last.
///
/// MySQL column names ignore case, so `ID` or `Id` is the identifier too. The
/// first non-null spelling wins and the others are discarded.
pub fn flatten_document(hit: &Hit) -> FlatRow {
    let mut id = None;
    let mut values = Vec::with_capacity(hit.source.len() + 1);

    for (name, value) in &hit.source {
        if name.eq_ignore_ascii_case(ID_COLUMN) {
            match (id.is_some(), FieldValue::from_json(value).to_text()) {
                (false, Some(text)) => {
                    values.push((ID_COLUMN.to_string(), FieldValue::Text(text.clone())));
                    id = Some(text);
                }
                (true, Some(_)) => {
                    debug!("{}: discarding duplicate identifier field '{}'", hit.id, name);
                }
                (_, None) => {}
            }
            continue;
        }
        values.push((name.clone(), FieldValue::from_json(value)));
    }

    let id = match id {
        Some(id) => id,
        None => {
            values.push((ID_COLUMN.to_string(), FieldValue::Text(hit.id.clone())));
            hit.id.clone()
        }
    };

    FlatRow { id, values }
}

/// Flatten documents in order, one row per document
pub fn flatten(hits: &[Hit]) -> Vec<FlatRow> {
    hits.iter().map(flatten_document).collect()
}
