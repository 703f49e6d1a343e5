//! Chat with SQL pipeline
//!
//! One linear flow per request: render the query prompt, ask the model for a query, run
//! it, then ask the model to narrate the rows. Each step waits on the previous one and
//! nothing is retried; the first failure is returned to the caller unchanged.

use crate::db::{format_records, QueryExecutor, Record};
use crate::error::Result;
use crate::llm::{ChatCompletion, GenerationParameters};
use crate::prompt::system::{ANALYSIS_SYSTEM_MESSAGE, QUERY_SYSTEM_MESSAGE};
use crate::prompt::{
    ComplexQueryGenerator, ComplexQueryRequest, Generator, NarrationRequest, QueryGenerator,
    QueryRequest, TableToNaturalGenerator,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Outcome of one request
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: Uuid,
    /// Query text exactly as returned by the model
    pub query: String,
    pub records: Vec<Record>,
    pub narration: String,
    pub completed_at: DateTime<Utc>,
}

pub struct ChatWithSql<C, E> {
    query: Generator<QueryGenerator, Arc<C>>,
    complex_query: Generator<ComplexQueryGenerator, Arc<C>>,
    narrator: Generator<TableToNaturalGenerator, Arc<C>>,
    executor: E,
    parameters: GenerationParameters,
}

impl<C, E> ChatWithSql<C, E>
where
    C: ChatCompletion,
    E: QueryExecutor,
{
    pub fn new(client: C, executor: E) -> Self {
        Self::from_shared(Arc::new(client), executor)
    }

    /// Build from a client that is shared with other components
    pub fn from_shared(client: Arc<C>, executor: E) -> Self {
        Self {
            query: Generator::new(QueryGenerator, client.clone(), QUERY_SYSTEM_MESSAGE),
            complex_query: Generator::new(
                ComplexQueryGenerator,
                client.clone(),
                QUERY_SYSTEM_MESSAGE,
            ),
            narrator: Generator::new(TableToNaturalGenerator, client, ANALYSIS_SYSTEM_MESSAGE),
            executor,
            parameters: GenerationParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Replace the system messages used for query generation and for narration
    pub fn with_system_messages(mut self, query: &str, analysis: &str) -> Self {
        self.query.set_system_message(query);
        self.complex_query.set_system_message(query);
        self.narrator.set_system_message(analysis);
        self
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Answer a simple semantic request
    pub async fn ask(&self, request: &QueryRequest, narration_prompt: &str) -> Result<Answer> {
        let request_id = Uuid::new_v4();
        async {
            let query = self.query.send_request(request, &self.parameters).await?;
            self.run_and_narrate(request_id, query, &request.prompt, narration_prompt)
                .await
        }
        .instrument(info_span!("ask", %request_id))
        .await
    }

    /// Answer a semantic request that carries the database schema
    pub async fn ask_complex(
        &self,
        request: &ComplexQueryRequest,
        narration_prompt: &str,
    ) -> Result<Answer> {
        let request_id = Uuid::new_v4();
        async {
            let query = self
                .complex_query
                .send_request(request, &self.parameters)
                .await?;
            self.run_and_narrate(request_id, query, &request.query.prompt, narration_prompt)
                .await
        }
        .instrument(info_span!("ask_complex", %request_id))
        .await
    }

    async fn run_and_narrate(
        &self,
        request_id: Uuid,
        query: String,
        original_prompt: &str,
        narration_prompt: &str,
    ) -> Result<Answer> {
        info!("Generated query: {}", query);
        let records = self.executor.fetch_records(&query).await?;

        let narration_request =
            NarrationRequest::new(narration_prompt, format_records(&records), original_prompt);
        let narration = self
            .narrator
            .send_request(&narration_request, &self.parameters)
            .await?;
        info!("Narration received ({} characters)", narration.len());

        Ok(Answer {
            request_id,
            query,
            records,
            narration,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatSqlError;
    use crate::prompt::{DbParams, Fields};
    use crate::schema::{SchemaEntry, SchemaMapping};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers query prompts with a fixed query and narration prompts with a summary
    struct ScriptedModel {
        query: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedModel {
        fn new(query: &str) -> Arc<Self> {
            Arc::new(Self {
                query: query.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<(String, String)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedModel {
        async fn send_request(
            &self,
            instruction: &str,
            system_message: &str,
            _parameters: &GenerationParameters,
        ) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((instruction.to_string(), system_message.to_string()));
            if system_message == QUERY_SYSTEM_MESSAGE {
                Ok(self.query.clone())
            } else {
                Ok("Two student products were found.".to_string())
            }
        }
    }

    struct FakeExecutor {
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeExecutor {
        fn new() -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeExecutor {
        async fn fetch_records(&self, query: &str) -> Result<Vec<Record>> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail {
                return Err(ChatSqlError::NotConnected);
            }
            let mut first = Record::new();
            first.insert("product_name".to_string(), json!("student lunchbox"));
            let mut second = Record::new();
            second.insert("product_name".to_string(), json!("student ID holder"));
            Ok(vec![first, second])
        }
    }

    fn products_request() -> QueryRequest {
        QueryRequest::new(
            "Retrieve all products that contain the name 'student'",
            "Postgres",
            DbParams::new("postgres", "products").with_fields(Fields::many(["product_name"])),
        )
        .with_programming_language("SQL")
    }

    #[tokio::test]
    async fn test_ask_runs_full_flow() {
        let model =
            ScriptedModel::new("SELECT product_name FROM products WHERE product_name LIKE '%student%'");
        let pipeline = ChatWithSql::from_shared(model.clone(), FakeExecutor::new());

        let answer = pipeline.ask(&products_request(), "Explain the data").await.unwrap();

        assert_eq!(
            answer.query,
            "SELECT product_name FROM products WHERE product_name LIKE '%student%'"
        );
        assert_eq!(answer.records.len(), 2);
        assert_eq!(answer.narration, "Two student products were found.");

        let executed = pipeline.executor().queries.lock().unwrap().clone();
        assert_eq!(executed, vec![answer.query.clone()]);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].0.contains("the fields are ['product_name']"));
        assert_eq!(prompts[1].1, ANALYSIS_SYSTEM_MESSAGE);
        assert!(prompts[1].0.contains("student lunchbox"));
        assert!(prompts[1].0.contains("ORIGINAL QUESTION:\nRetrieve all products"));
        assert!(prompts[1].0.ends_with("DO:\nExplain the data"));
    }

    #[tokio::test]
    async fn test_ask_complex_sends_schema() {
        let mut mapping = SchemaMapping::new();
        mapping.insert("categories", "category_name", SchemaEntry::new("categories", "text"));

        let model = ScriptedModel::new("SELECT category_name FROM categories");
        let pipeline = ChatWithSql::from_shared(model.clone(), FakeExecutor::new());
        let request = ComplexQueryRequest::new(products_request(), mapping.clone());

        let answer = pipeline.ask_complex(&request, "Evaluate").await.unwrap();
        assert_eq!(answer.query, "SELECT category_name FROM categories");

        let prompts = model.prompts();
        assert!(prompts[0]
            .0
            .contains(&format!("The database schema is {}.", mapping)));
    }

    #[tokio::test]
    async fn test_missing_parameter_stops_before_model() {
        let model = ScriptedModel::new("SELECT 1");
        let pipeline = ChatWithSql::from_shared(model.clone(), FakeExecutor::new());
        let mut request = products_request();
        request.db_params.table_name = None;

        let err = pipeline.ask(&request, "Explain").await.unwrap_err();
        assert!(matches!(err, ChatSqlError::MissingParameter(_)));
        assert!(model.prompts().is_empty());
        assert!(pipeline.executor().queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_executor_failure_skips_narration() {
        let mut executor = FakeExecutor::new();
        executor.fail = true;
        let model = ScriptedModel::new("SELECT 1");
        let pipeline = ChatWithSql::from_shared(model.clone(), executor);

        assert!(pipeline.ask(&products_request(), "Explain").await.is_err());
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_system_messages() {
        let model = ScriptedModel::new("SELECT 1");
        let pipeline = ChatWithSql::from_shared(model.clone(), FakeExecutor::new())
            .with_system_messages("query system", "analysis system");

        // Not the stock query message, so the scripted model narrates instead
        let answer = pipeline.ask(&products_request(), "Explain").await.unwrap();
        assert_eq!(answer.query, "Two student products were found.");

        let prompts = model.prompts();
        assert_eq!(prompts[0].1, "query system");
        assert_eq!(prompts[1].1, "analysis system");
    }
}
