//! Database module for PostgreSQL connection and query execution

mod catalog;
pub mod connection;

pub use connection::PostgresDatabase;

use crate::error::Result;
use async_trait::async_trait;

/// One result row as an ordered column → value object
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Executes query text and returns its rows
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_records(&self, query: &str) -> Result<Vec<Record>>;
}

/// Stringify rows for a narration prompt
pub fn format_records(records: &[Record]) -> String {
    serde_json::Value::Array(
        records
            .iter()
            .cloned()
            .map(serde_json::Value::Object)
            .collect(),
    )
    .to_string()
}
