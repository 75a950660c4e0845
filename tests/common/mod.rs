#![allow(dead_code)]

use async_trait::async_trait;
use elastic_etl_rs::error::EtlError;
use elastic_etl_rs::flatten::{FieldValue, ID_COLUMN};
use elastic_etl_rs::schema::ColumnSpec;
use elastic_etl_rs::source::{DocumentSource, Hit, Page};
use elastic_etl_rs::store::TableStore;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Build hits from `_source` objects, numbering ids from 1
pub fn hits(docs: Vec<Value>) -> Vec<Hit> {
    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let source = doc.as_object().cloned().expect("document must be an object");
            Hit::new((i + 1).to_string(), source)
        })
        .collect()
}

/// In-memory source serving each index in pages of `page_size`, cursor = next offset
pub struct MemorySource {
    page_size: usize,
    indices: BTreeMap<String, Vec<Hit>>,
    broken: Vec<String>,
    pub requests: Mutex<Vec<(String, Option<String>)>>,
    pub released: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            indices: BTreeMap::new(),
            broken: Vec::new(),
            requests: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn with_index(mut self, name: &str, hits: Vec<Hit>) -> Self {
        self.indices.insert(name.to_string(), hits);
        self
    }

    /// Every fetch for this index fails like a dropped connection
    pub fn with_broken_index(mut self, name: &str) -> Self {
        self.indices.insert(name.to_string(), Vec::new());
        self.broken.push(name.to_string());
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn list_units(&self) -> Result<Vec<String>, EtlError> {
        Ok(self.indices.keys().cloned().collect())
    }

    async fn fetch_page(&self, unit: &str, cursor: Option<&str>) -> Result<Page, EtlError> {
        self.requests
            .lock()
            .unwrap()
            .push((unit.to_string(), cursor.map(str::to_string)));

        if self.broken.iter().any(|b| b == unit) {
            return Err(EtlError::Fetch {
                index: unit.to_string(),
                reason: "simulated network error".to_string(),
            });
        }

        let docs = self.indices.get(unit).ok_or_else(|| EtlError::Fetch {
            index: unit.to_string(),
            reason: "no such index".to_string(),
        })?;

        let offset: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let end = (offset + self.page_size).min(docs.len());
        Ok(Page {
            hits: docs[offset.min(end)..end].to_vec(),
            cursor: Some(end.to_string()),
        })
    }

    async fn release(&self, cursor: &str) {
        self.released.lock().unwrap().push(cursor.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub spec: ColumnSpec,
    pub rows: Vec<Vec<FieldValue>>,
}

impl MemoryTable {
    fn key_position(&self) -> usize {
        self.spec.position(ID_COLUMN).unwrap()
    }

    /// Value of `column` in the row whose key is `id`
    pub fn value(&self, id: &str, column: &str) -> Option<FieldValue> {
        let key = self.key_position();
        let position = self.spec.position(column)?;
        self.rows
            .iter()
            .find(|row| row[key] == FieldValue::Text(id.to_string()))
            .map(|row| row[position].clone())
    }
}

/// In-memory table store with insert-or-update by primary key, as strict as MySQL about columns and types
#[derive(Default)]
pub struct MemoryStore {
    pub tables: Mutex<HashMap<String, MemoryTable>>,
    /// Tables whose writes fail
    pub failing_tables: Vec<String>,
    pub batches: Mutex<Vec<(String, usize)>>,
}

impl MemoryStore {
    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.table(name).map_or(0, |t| t.rows.len())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn create_table(&self, table: &str, spec: &ColumnSpec) -> Result<(), sqlx::Error> {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable {
                spec: spec.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn write_batch(
        &self,
        table: &str,
        spec: &ColumnSpec,
        rows: &[Vec<FieldValue>],
    ) -> Result<(), sqlx::Error> {
        if self.failing_tables.iter().any(|t| t == table) {
            return Err(sqlx::Error::Protocol("simulated write failure".into()));
        }

        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| sqlx::Error::Protocol(format!("table {} does not exist", table)))?;

        if let Some(unknown) = spec.names().find(|name| !stored.spec.contains(name)) {
            return Err(sqlx::Error::Protocol(format!(
                "Unknown column '{}' in 'field list'",
                unknown
            )));
        }

        // strict mode rejects values the column type cannot hold
        for row in rows {
            for (column, value) in spec.columns().iter().zip(row) {
                if !column.ty.accepts(value) {
                    return Err(sqlx::Error::Protocol(format!(
                        "Incorrect {} value for column '{}'",
                        column.ty, column.name
                    )));
                }
            }
        }

        let key = stored.key_position();
        for row in rows {
            // lay the incoming row out in the stored table's column order
            let laid_out: Vec<FieldValue> = stored
                .spec
                .names()
                .map(|name| match spec.position(name) {
                    Some(i) => row[i].clone(),
                    None => FieldValue::Null,
                })
                .collect();
            match stored.rows.iter_mut().find(|r| r[key] == laid_out[key]) {
                Some(existing) => *existing = laid_out,
                None => stored.rows.push(laid_out),
            }
        }
        self.batches
            .lock()
            .unwrap()
            .push((table.to_string(), rows.len()));
        Ok(())
    }
}
