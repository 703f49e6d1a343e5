//! Chat with SQL
//!
//! Turns natural-language requests into database queries through a language model,
//! runs them against PostgreSQL and asks the model to narrate the result set.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod schema;

pub use config::{AppConfig, DatabaseConfig, LlmAuth, LlmConfig};
pub use db::{format_records, PostgresDatabase, QueryExecutor, Record};
pub use error::{ChatSqlError, Result};
pub use llm::{ChatCompletion, GenerationParameters, LlmClient};
pub use pipeline::{Answer, ChatWithSql};
pub use prompt::{
    ComplexQueryGenerator, ComplexQueryRequest, DbParams, Fields, Generator, NarrationRequest,
    PromptGenerator, QueryGenerator, QueryRequest, TableToNaturalGenerator,
};
pub use schema::{introspect, CatalogReader, ForeignKey, SchemaEntry, SchemaMapping};
