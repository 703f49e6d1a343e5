//! Catalog queries backing schema introspection

use super::PostgresDatabase;
use crate::error::Result;
use crate::schema::{CatalogReader, ColumnInfo, ForeignKeyInfo};
use async_trait::async_trait;

const TABLES_QUERY: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = 'public' AND table_name::text = $1
    ORDER BY ordinal_position
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        kcu.column_name::text,
        ccu.table_name::text AS foreign_table_name,
        ccu.column_name::text AS foreign_column_name
    FROM
        information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
          ON tc.constraint_name = kcu.constraint_name
          AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage AS ccu
          ON ccu.constraint_name = tc.constraint_name
          AND ccu.table_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = 'public'
      AND tc.table_name::text = $1
    ORDER BY kcu.ordinal_position
"#;

#[async_trait]
impl CatalogReader for PostgresDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(TABLES_QUERY)
            .fetch_all(self.pool()?)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows: Vec<(String, String)> = sqlx::query_as(COLUMNS_QUERY)
            .bind(table)
            .fetch_all(self.pool()?)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(FOREIGN_KEYS_QUERY)
            .bind(table)
            .fetch_all(self.pool()?)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(column_name, foreign_table, foreign_column)| ForeignKeyInfo {
                column_name,
                foreign_table,
                foreign_column,
            })
            .collect())
    }
}
