//! Schema Introspection
//!
//! Builds a [`SchemaMapping`] describing every column of every table in the public
//! schema: its table, data type and the foreign key it participates in, if any.
//! The catalog is read through [`CatalogReader`]; every call re-reads it.

use crate::error::Result;
use crate::prompt::quote;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Foreign-key constraint column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column_name: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

/// Read-only access to the database catalog
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Table names of the public schema
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of a public-schema table
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Foreign-key columns of a public-schema table
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>>;
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "foreign key to {} through {}", self.table, self.column)
    }
}

/// Description of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub table_name: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl SchemaEntry {
    pub fn new(table_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            data_type: data_type.into(),
            foreign_key: None,
        }
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }
}

impl fmt::Display for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let foreign_key = match &self.foreign_key {
            Some(fk) => quote(&fk.to_string()),
            None => "None".to_string(),
        };
        write!(
            f,
            "[{}, {}, {}]",
            quote(&format!("Table Name: {}", self.table_name)),
            quote(&format!("Data Type: {}", self.data_type)),
            foreign_key
        )
    }
}

/// Column descriptor → column description, ordered by descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMapping {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor used as the mapping key for a column
    pub fn descriptor(table: &str, column: &str) -> String {
        format!("Column name: {}.{}", table, column)
    }

    pub fn insert(&mut self, table: &str, column: &str, entry: SchemaEntry) -> Option<SchemaEntry> {
        self.entries.insert(Self::descriptor(table, column), entry)
    }

    pub fn get(&self, table: &str, column: &str) -> Option<&SchemaEntry> {
        self.entries.get(&Self::descriptor(table, column))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaEntry)> {
        self.entries.iter()
    }
}

impl fmt::Display for SchemaMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|(key, entry)| format!("{}: {}", quote(key), quote(&entry.to_string())))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

/// Read the catalog and describe every public-schema column
///
/// Foreign keys are matched on the raw column name on both sides.
pub async fn introspect<R>(reader: &R) -> Result<SchemaMapping>
where
    R: CatalogReader + ?Sized,
{
    let mut mapping = SchemaMapping::new();
    let tables = reader.list_tables().await?;

    for table in &tables {
        let columns = reader.columns(table).await?;
        let foreign_keys = reader.foreign_keys(table).await?;
        debug!(
            "Table {}: {} columns, {} foreign keys",
            table,
            columns.len(),
            foreign_keys.len()
        );

        for column in columns {
            let foreign_key = foreign_keys
                .iter()
                .find(|fk| fk.column_name == column.name)
                .map(|fk| ForeignKey::new(&fk.foreign_table, &fk.foreign_column));

            let entry = SchemaEntry {
                table_name: table.clone(),
                data_type: column.data_type,
                foreign_key,
            };
            mapping.insert(table, &column.name, entry);
        }
    }

    info!(
        "Introspected {} columns across {} tables",
        mapping.len(),
        tables.len()
    );
    Ok(mapping)
}
