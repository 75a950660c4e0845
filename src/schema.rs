use std::collections::HashMap;
use std::fmt;

use crate::flatten::{FieldValue, FlatRow, ID_COLUMN};

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Text primary key holding the document identifier
    Identifier,
    Int,
    Float,
    Text,
}

impl ColumnType {
    /// Whether a value can be stored in the column without conversion.
    ///
    /// NULL fits every column and integers fit FLOAT columns.
    pub fn accepts(self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Null) => true,
            (ColumnType::Identifier | ColumnType::Text, _) => true,
            (ColumnType::Float, FieldValue::Integer(_) | FieldValue::Float(_)) => true,
            (ColumnType::Int, FieldValue::Integer(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Identifier => "identifier",
            ColumnType::Int => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// Ordered column definitions of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    columns: Vec<ColumnDef>,
}

impl ColumnSpec {
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.ty)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Widest value kind seen so far in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Observed {
    Unseen,
    Int,
    Float,
    Text,
}

impl Observed {
    fn widen(self, value: &FieldValue) -> Self {
        let kind = match value {
            FieldValue::Null => return self,
            FieldValue::Integer(_) => Observed::Int,
            FieldValue::Float(_) => Observed::Float,
            FieldValue::Text(_) | FieldValue::Nested(_) => Observed::Text,
        };
        self.max(kind)
    }

    fn column_type(self) -> ColumnType {
        match self {
            Observed::Int => ColumnType::Int,
            Observed::Float => ColumnType::Float,
            Observed::Unseen | Observed::Text => ColumnType::Text,
        }
    }
}

/// Derive a column spec from a batch of rows.
///
/// Columns appear in first-occurrence order. Types widen from INT to FLOAT to
/// text; null values are ignored and all-null columns become text. The
/// identifier column is always present and always the text primary key.
pub fn infer_schema(rows: &[FlatRow]) -> ColumnSpec {
    let mut order: Vec<(String, Observed)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        for (name, value) in row.iter() {
            let slot = match index.get(name) {
                Some(&slot) => slot,
                None => {
                    index.insert(name.to_string(), order.len());
                    order.push((name.to_string(), Observed::Unseen));
                    order.len() - 1
                }
            };
            order[slot].1 = order[slot].1.widen(value);
        }
    }

    if !index.contains_key(ID_COLUMN) {
        order.push((ID_COLUMN.to_string(), Observed::Unseen));
    }

    let columns = order
        .into_iter()
        .map(|(name, observed)| {
            let ty = if name == ID_COLUMN {
                ColumnType::Identifier
            } else {
                observed.column_type()
            };
            ColumnDef { name, ty }
        })
        .collect();

    ColumnSpec { columns }
}
