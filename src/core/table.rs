//! Tabular persistence: one CSV file per named entity collection.
//!
//! The header row comes from the first entity's canonical projection, in
//! insertion order. Nested sequences and mappings survive the flat format by
//! being re-encoded as compact JSON text inside a single cell.

use crate::domain::Canonical;
use crate::utils::error::{Result, StudyError};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct TableStore {
    base_dir: PathBuf,
}

impl TableStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.csv"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.table_path(name).exists()
    }

    /// Overwrites the named resource with the given entities.
    ///
    /// An empty slice is a no-op: without a first entity there is no header
    /// to derive, and an existing file is deliberately left untouched.
    pub fn write<T: Canonical>(&self, name: &str, entities: &[T]) -> Result<()> {
        let Some(first) = entities.first() else {
            tracing::debug!("nothing to write for '{}', leaving resource as is", name);
            return Ok(());
        };

        let header: Vec<String> = first.to_canonical().keys().cloned().collect();
        let mut writer = csv::Writer::from_path(self.table_path(name))?;
        writer.write_record(&header)?;

        for entity in entities {
            let map = entity.to_canonical();
            let row = header
                .iter()
                .map(|field| encode_cell(map.get(field).unwrap_or(&Value::Null)))
                .collect::<Result<Vec<String>>>()?;
            writer.write_record(&row)?;
        }
        writer.flush()?;

        tracing::debug!("wrote {} record(s) to '{}'", entities.len(), name);
        Ok(())
    }

    /// Reads every row of the named resource back into entities.
    pub fn read<T: Canonical>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.table_path(name);
        if !path.exists() {
            return Err(StudyError::ResourceNotFound {
                name: name.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let header = reader.headers()?.clone();

        let mut entities = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut map = Map::new();
            for (i, field) in header.iter().enumerate() {
                map.insert(field.to_string(), decode_cell(record.get(i).unwrap_or("")));
            }
            entities.push(T::from_canonical(&map)?);
        }

        tracing::debug!("read {} record(s) from '{}'", entities.len(), name);
        Ok(entities)
    }
}

/// Renders one canonical value as CSV cell text. Nested sequences and
/// mappings become compact JSON; everything else is written bare.
fn encode_cell(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value)?,
    })
}

/// Recovers a canonical value from cell text. Only non-empty cells are
/// decoded; text that is not valid JSON stays a plain string.
fn decode_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
