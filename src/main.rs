use anyhow::{Context, Result};
use chat_with_sql::{
    introspect, ChatWithSql, ComplexQueryGenerator, ComplexQueryRequest, DatabaseConfig, DbParams,
    Fields, GenerationParameters, LlmClient, LlmConfig, PostgresDatabase, PromptGenerator,
    QueryGenerator, QueryRequest,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoUtc, EnvFilter};

const DEFAULT_EXPLAIN: &str =
    "Explain the data in the following data, considering the original question provided.";

#[derive(Parser)]
#[command(name = "chat-with-sql")]
#[command(about = "Ask questions about a PostgreSQL database in natural language")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Chat-completions endpoint URL (or set LLM_URL)
    #[arg(long, global = true)]
    llm_url: Option<String>,

    /// API key for the endpoint (or set LLM_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// PostgreSQL connection URL (or set DATABASE_URL / PG* variables)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = 0.0)]
    temperature: f32,

    /// Nucleus sampling threshold
    #[arg(long, global = true, default_value_t = 0.95)]
    top_p: f32,

    /// Output length cap
    #[arg(long, global = true, default_value_t = 2000)]
    max_tokens: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a query, run it and narrate the result
    Ask {
        #[command(flatten)]
        request: RequestArgs,

        /// Include the introspected database schema in the prompt
        #[arg(long)]
        complex: bool,

        /// Instruction for the narration step
        #[arg(long, default_value = DEFAULT_EXPLAIN)]
        explain: String,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the prompt that would be sent, without calling the model
    Render {
        #[command(flatten)]
        request: RequestArgs,

        /// Include the introspected database schema in the prompt
        #[arg(long)]
        complex: bool,
    },
    /// Print the introspected schema of the public tables
    Schema {
        /// Print the mapping as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the two bundled example requests against the shop database
    Demo,
}

#[derive(ClapArgs, Clone)]
struct RequestArgs {
    /// The request in natural language
    prompt: String,

    /// Query dialect the model should produce
    #[arg(long, default_value = "Postgres")]
    query_type: String,

    /// Programming language hint
    #[arg(long)]
    language: Option<String>,

    /// Database name (defaults to the connected database)
    #[arg(long)]
    database: Option<String>,

    /// Table the request is about
    #[arg(long)]
    table: Option<String>,

    /// A single field
    #[arg(long, conflicts_with = "fields")]
    field: Option<String>,

    /// Several fields, comma separated
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
}

impl RequestArgs {
    fn into_request(self, default_database: &str) -> QueryRequest {
        let fields = match (self.field, self.fields.is_empty()) {
            (Some(field), _) => Some(Fields::Single(field)),
            (None, false) => Some(Fields::Many(self.fields)),
            (None, true) => None,
        };

        let db_params = DbParams {
            database_name: Some(self.database.unwrap_or_else(|| default_database.to_string())),
            table_name: self.table,
            fields,
            ..Default::default()
        };

        let mut request = QueryRequest::new(self.prompt, self.query_type, db_params);
        request.programming_language = self.language;
        request
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Args {
    fn database_config(&self) -> Result<DatabaseConfig> {
        let config = DatabaseConfig::from_lookup(&env_lookup)?;
        match &self.database_url {
            Some(url) => Ok(config.with_url(url.clone())?),
            None => Ok(config),
        }
    }

    fn llm_config(&self) -> Result<LlmConfig> {
        let llm_url = self.llm_url.clone();
        let api_key = self.api_key.clone();
        let lookup = move |key: &str| match key {
            "LLM_URL" => llm_url.clone().or_else(|| env_lookup(key)),
            "LLM_API_KEY" => api_key.clone().or_else(|| env_lookup(key)),
            _ => env_lookup(key),
        };
        Ok(LlmConfig::from_lookup(&lookup)?)
    }

    fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }
}

async fn connect(config: DatabaseConfig) -> Result<PostgresDatabase> {
    let mut db = PostgresDatabase::new(config);
    db.connect().await.context("failed to connect to PostgreSQL")?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Schema { json } => {
            let mut db = connect(args.database_config()?).await?;
            let mapping = introspect(&db).await?;
            db.disconnect().await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&mapping)?);
            } else {
                for (descriptor, entry) in mapping.iter() {
                    println!("{} => {}", descriptor, entry);
                }
            }
        }
        Command::Render { request, complex } => {
            let db_config = args.database_config()?;
            let request = request_from(request, &db_config);

            let rendered = if *complex {
                let mut db = connect(db_config).await?;
                let mapping = introspect(&db).await?;
                db.disconnect().await?;
                ComplexQueryGenerator.prepare_request(&ComplexQueryRequest::new(request, mapping))?
            } else {
                QueryGenerator.prepare_request(&request)?
            };
            println!("{}", rendered);
        }
        Command::Ask {
            request,
            complex,
            explain,
            json,
        } => {
            let db_config = args.database_config()?;
            let request = request_from(request, &db_config);
            let client = LlmClient::new(args.llm_config()?);
            let db = connect(db_config).await?;

            let mapping = if *complex {
                Some(introspect(&db).await?)
            } else {
                None
            };

            let pipeline = ChatWithSql::new(client, db).with_parameters(args.parameters());
            let outcome = match mapping {
                Some(mapping) => {
                    pipeline
                        .ask_complex(&ComplexQueryRequest::new(request, mapping), explain)
                        .await
                }
                None => pipeline.ask(&request, explain).await,
            };

            let mut db = pipeline.into_executor();
            db.disconnect().await?;
            let answer = outcome?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("Query:\n{}\n", answer.query);
                println!("Rows: {}\n", answer.records.len());
                println!("{}", answer.narration);
            }
        }
        Command::Demo => run_demo(&args).await?,
    }

    Ok(())
}

fn request_from(request: &RequestArgs, db_config: &DatabaseConfig) -> QueryRequest {
    request.clone().into_request(&db_config.database)
}

/// The bundled walkthrough: one simple and one schema-aware request
async fn run_demo(args: &Args) -> Result<()> {
    let db_config = args.database_config()?;
    let database_name = db_config.database.clone();
    let client = LlmClient::new(args.llm_config()?);
    let db = connect(db_config).await?;
    let mapping = introspect(&db).await?;

    let simple = QueryRequest::new(
        "Retrieve the information from all products that contains the name 'student' but are not 'student loans'.",
        "Postgres",
        DbParams::new(database_name.clone(), "products")
            .with_fields(Fields::many(["product_name", "product_description"])),
    )
    .with_programming_language("SQL");

    let complex = ComplexQueryRequest::new(
        QueryRequest::new(
            "Retrieve the name from all categories which had products where sold for students on classroom 2.",
            "Postgres",
            DbParams::new(database_name, "categories").with_fields(Fields::many(["category_name"])),
        )
        .with_programming_language("SQL"),
        mapping,
    );

    let pipeline = ChatWithSql::new(client, db).with_parameters(args.parameters());

    let outcome = async {
        let simple_answer = pipeline.ask(&simple, DEFAULT_EXPLAIN).await?;
        info!("Simple query: {}", simple_answer.query);
        let complex_answer = pipeline
            .ask_complex(
                &complex,
                "Evaluate if the data provided is sufficient to answer the user original question.",
            )
            .await?;
        info!("Complex query: {}", complex_answer.query);
        Ok::<_, chat_with_sql::ChatSqlError>((simple_answer, complex_answer))
    }
    .await;

    let mut db = pipeline.into_executor();
    db.disconnect().await?;
    let (simple_answer, complex_answer) = outcome?;

    println!(
        "\n\n**SIMPLE ANALYSIS**:\n{},\n\n**COMPLEX ANALYSIS**:\n{}",
        simple_answer.narration, complex_answer.narration
    );
    Ok(())
}
