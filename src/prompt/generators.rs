//! Prompt Generators
//!
//! Render semantic requests into instruction strings. The clauses naming the database
//! and table go through strict substitution, so a request without them fails before
//! anything is rendered; the optional clauses use best-effort substitution.

use super::request::{ComplexQueryRequest, Fields, NarrationRequest, QueryRequest};
use super::template::{Template, Values};
use crate::error::{ChatSqlError, Result};
use crate::llm::{ChatCompletion, GenerationParameters};
use tracing::{debug, error};

/// Renders one kind of request into an instruction string
pub trait PromptGenerator {
    type Request;

    fn prepare_request(&self, request: &Self::Request) -> Result<String>;
}

/// Simple query prompts: prompt, dialect, database, table, fields
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGenerator;

/// Query prompts that also describe the database schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexQueryGenerator;

/// Prompts that ask the model to explain a result set
#[derive(Debug, Clone, Copy, Default)]
pub struct TableToNaturalGenerator;

const NARRATION_TEMPLATE: &str = "Considering the data
DATA:
$data

and the original question
ORIGINAL QUESTION:
$original_prompt

DO:
$prompt";

const REQUIRED_CLAUSES: &str =
    "$prompt using $query_type. The database name is $database_name, the table is $table_name";

impl PromptGenerator for QueryGenerator {
    type Request = QueryRequest;

    fn prepare_request(&self, request: &QueryRequest) -> Result<String> {
        let (required, mut optional, values) = query_clauses(
            request,
            "The database name and table name are required to generate a query.",
        )?;
        push_programming_language(&mut optional, request);
        Ok(required + &optional.safe_substitute(&values))
    }
}

impl PromptGenerator for ComplexQueryGenerator {
    type Request = ComplexQueryRequest;

    fn prepare_request(&self, request: &ComplexQueryRequest) -> Result<String> {
        let (required, mut optional, mut values) = query_clauses(
            &request.query,
            "The database name, schema and table name are required to generate a query.",
        )?;

        let mapping = match &request.schema_mapping {
            Some(mapping) if !mapping.is_empty() => mapping,
            _ => {
                error!("Could not find a database schema mapping for the complex query");
                return Err(ChatSqlError::MissingParameter(
                    "The database mapping is required to generate a query.".to_string(),
                ));
            }
        };

        optional.push(" The database schema is $db_mapping.");
        values.insert("db_mapping".to_string(), mapping.to_string());

        push_programming_language(&mut optional, &request.query);
        Ok(required + &optional.safe_substitute(&values))
    }
}

impl PromptGenerator for TableToNaturalGenerator {
    type Request = NarrationRequest;

    fn prepare_request(&self, request: &NarrationRequest) -> Result<String> {
        let mut values = Values::new();
        values.insert("data".to_string(), request.data.clone());
        values.insert("original_prompt".to_string(), request.original_prompt.clone());
        values.insert("prompt".to_string(), request.prompt.clone());

        Ok(Template::new(NARRATION_TEMPLATE).safe_substitute(&values))
    }
}

/// Render the required clauses strictly, then start the optional ones.
///
/// Returns the rendered required text, a template holding the optional clauses built so
/// far (the fields clause) and the values both share.
fn query_clauses(
    request: &QueryRequest,
    missing_message: &str,
) -> Result<(String, Template, Values)> {
    let params = &request.db_params;

    let mut values = Values::new();
    for (key, value) in &params.extra {
        values.insert(key.clone(), value.to_string());
    }
    values.insert("prompt".to_string(), request.prompt.clone());
    values.insert("query_type".to_string(), request.query_type.clone());
    if let Some(database_name) = &params.database_name {
        values.insert("database_name".to_string(), database_name.clone());
    }
    if let Some(table_name) = &params.table_name {
        values.insert("table_name".to_string(), table_name.clone());
    }
    if let Some(language) = &request.programming_language {
        values.insert("programming_language".to_string(), language.clone());
    }

    let required = Template::new(REQUIRED_CLAUSES)
        .substitute(&values)
        .map_err(|_| {
            error!(
                "Could not find database_name and table_name in db_params. Found: {:?}",
                params.keys()
            );
            ChatSqlError::MissingParameter(missing_message.to_string())
        })?;

    let mut optional = Template::default();
    match &params.fields {
        Some(fields @ Fields::Single(_)) => {
            optional.push(" and the field is $field.");
            values.insert("field".to_string(), fields.to_string());
        }
        Some(fields @ Fields::Many(_)) => {
            optional.push(" and the fields are $fields.");
            values.insert("fields".to_string(), fields.to_string());
        }
        None => {
            error!("Could not find fields in db_params, skipping the fields clause");
        }
    }

    Ok((required, optional, values))
}

fn push_programming_language(template: &mut Template, request: &QueryRequest) {
    let has_language = request
        .programming_language
        .as_deref()
        .map_or(false, |language| !language.is_empty());

    if has_language {
        template.push(" The programming language is $programming_language.");
    }
}

/// A prompt generator bound to a model client and a system message
pub struct Generator<G, C> {
    generator: G,
    client: C,
    system_message: String,
}

impl<G, C> Generator<G, C>
where
    G: PromptGenerator,
    C: ChatCompletion,
{
    pub fn new(generator: G, client: C, system_message: impl Into<String>) -> Self {
        Self {
            generator,
            client,
            system_message: system_message.into(),
        }
    }

    pub fn set_system_message(&mut self, system_message: impl Into<String>) {
        self.system_message = system_message.into();
    }

    /// Render the request and send it to the model, returning the completion text
    pub async fn send_request(
        &self,
        request: &G::Request,
        parameters: &GenerationParameters,
    ) -> Result<String> {
        let instruction = self.generator.prepare_request(request)?;
        debug!("Rendered instruction: {}", instruction);

        self.client
            .send_request(&instruction, &self.system_message, parameters)
            .await
    }
}
