//! oxide-query CLI
//!
//! Rewrites statements for a backend dialect and runs named queries against
//! a SQLite database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_dialect::{DialectHints, DialectRegistry};
use oxide_query::{
    BackoffStrategy, InMemoryDefinitions, NamedParameterTemplate, PathPredicateEngine,
    QueryConfig, QueryParameter, QueryService, SqliteExecutor, StreamQueryParameter,
};

/// Declarative queries with cross-database paging.
#[derive(Parser)]
#[command(name = "oxide-query")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a statement limited to a window, or its count query.
    Rewrite {
        /// Backend identifier (`mysql`, `oracle`, ...) or connection
        /// descriptor (`jdbc:sqlserver://...`).
        #[arg(short, long, default_value = "sqlite")]
        backend: String,

        /// First row of the window.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Rows in the window.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Print the count query instead.
        #[arg(long)]
        count: bool,

        /// The SQL statement.
        sql: String,
    },

    /// Run a named query and print the result as JSON.
    Run {
        /// Database URL (SQLite path or connection string).
        #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
        database: String,

        /// JSON file holding an array of query definitions.
        #[arg(long)]
        definitions: PathBuf,

        /// JSON file holding the service configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Name of the query to run.
        #[arg(short, long)]
        query: String,

        /// Retrieval mode.
        #[arg(short, long, value_enum, default_value_t = Mode::Select)]
        mode: Mode,

        /// Criteria as a JSON object.
        #[arg(long)]
        criteria: Option<String>,

        /// First row to return.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size, forward window or stream batch size.
        #[arg(long)]
        limit: Option<usize>,

        /// Retries of a failing stream batch.
        #[arg(long, default_value_t = 0)]
        retries: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Get,
    Select,
    Page,
    Forward,
    Stream,
    Count,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = DialectRegistry::new();

    match cli.command {
        Commands::Rewrite {
            backend,
            offset,
            limit,
            count,
            sql,
        } => {
            let dialect = registry
                .by_identifier(&backend)
                .or_else(|_| registry.resolve(&backend))?;
            let hints = DialectHints::new();
            let text = if count {
                dialect.count_text(&sql, &hints)
            } else {
                dialect.limit_text(&sql, offset, limit, &hints)?
            };
            println!("{text}");
        }

        Commands::Run {
            database,
            definitions,
            config,
            query,
            mode,
            criteria,
            offset,
            limit,
            retries,
        } => {
            let json = std::fs::read_to_string(&definitions)
                .with_context(|| format!("reading {}", definitions.display()))?;
            let repository = InMemoryDefinitions::from_json(&json)?;
            let config = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&text)?
                }
                None => QueryConfig::default(),
            };

            let dialect = registry.resolve(&database)?;
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&database)
                .await?;
            info!(dialect = dialect.name(), definitions = repository.len(), "Connected");

            let service = QueryService::builder(
                dialect,
                Arc::new(repository),
                Arc::new(NamedParameterTemplate::new()),
                Arc::new(SqliteExecutor::new(pool)),
            )
            .config(config)
            .script_engine(Arc::new(PathPredicateEngine::new()))
            .build();

            let criteria = match criteria {
                Some(text) => serde_json::from_str(&text).context("parsing --criteria")?,
                None => Value::Object(serde_json::Map::new()),
            };
            let mut parameter = QueryParameter::new(criteria).with_offset(offset);
            parameter.limit = limit;

            let output = match mode {
                Mode::Get => serde_json::to_value(service.get::<Value>(&query, parameter).await?)?,
                Mode::Select => {
                    serde_json::to_value(service.select::<Value>(&query, parameter).await?)?
                }
                Mode::Page => {
                    let page = service.page::<Value>(&query, parameter).await?;
                    info!(
                        page = page.current_page(),
                        pages = page.total_pages(),
                        total = page.total,
                        "Fetched page"
                    );
                    serde_json::to_value(page)?
                }
                Mode::Forward => {
                    serde_json::to_value(service.forward::<Value>(&query, parameter).await?)?
                }
                Mode::Count => Value::from(service.count(&query, parameter).await?),
                Mode::Stream => {
                    let param = StreamQueryParameter::new(parameter)
                        .with_retry(retries, BackoffStrategy::Fixed(std::time::Duration::from_millis(200)));
                    let mut stream = service.stream::<Value>(&query, param);
                    while let Some(item) = stream.next().await? {
                        println!("{item}");
                    }
                    info!(items = stream.emitted(), "Stream finished");
                    stream.close();
                    return Ok(());
                }
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
