//! Tabula CLI - Ask questions about local data files from the terminal

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tabula_ai::{LlmCredentials, ProviderKind, QueryGenerator};
use tabula_core::{QueryEngine, QueryResult, TableStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Query uploaded tables with SQL or plain English")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding stored tables
    #[arg(long, global = true, env = "TABULA_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Import a CSV, JSON, JSON Lines or Parquet file before running the command
    #[arg(short, long = "data", global = true)]
    data: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables with their columns and row counts
    Tables,

    /// Run a read-only SQL query
    Sql {
        /// The SQL statement
        sql: String,
    },

    /// Translate a question into SQL and run it (requires LLM API key)
    Ask {
        /// The question, in plain English
        question: String,

        /// Only use this vendor
        #[arg(short, long)]
        provider: Option<Provider>,
    },

    /// Suggest a question to ask about the loaded tables (requires LLM API key)
    Suggest,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Openai,
    Anthropic,
}

impl From<Provider> for ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Openai => ProviderKind::OpenAI,
            Provider::Anthropic => ProviderKind::Anthropic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let engine = open_engine(&cli.data_dir, &cli.data).await?;

    match cli.command {
        Commands::Tables => list_tables(&engine).await?,
        Commands::Sql { sql } => {
            let result = engine.execute(&sql).await?;
            print_result(&result)?;
        }
        Commands::Ask { question, provider } => {
            ask(&engine, &question, provider.map(ProviderKind::from)).await?;
        }
        Commands::Suggest => {
            let schema = engine.describe().await?;
            let question = QueryGenerator::new()
                .generate_natural_language_query(&schema, &LlmCredentials::from_env())
                .await?;
            println!("{}", question);
        }
    }

    Ok(())
}

/// Register everything in the data directory, then import the requested files
async fn open_engine(data_dir: &Path, files: &[PathBuf]) -> Result<QueryEngine> {
    let store = TableStore::new(data_dir)?;
    let mut engine = QueryEngine::new();
    engine.restore_from(&store).await?;

    for file in files {
        let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {:?}", file))?;
        let table_name = engine.import_upload(&store, filename, &bytes).await?;
        info!("Imported {:?} as table '{}'", file, table_name);
    }

    Ok(engine)
}

async fn list_tables(engine: &QueryEngine) -> Result<()> {
    let schema = engine.describe().await?;
    if schema.is_empty() {
        println!("No tables loaded. Use --data <FILE> to import one.");
        return Ok(());
    }

    for (name, table) in &schema.tables {
        println!("{} ({} rows)", name, table.row_count);
        for column in &table.columns {
            println!("  {:<24} {}", column.name, column.data_type);
        }
        println!();
    }
    Ok(())
}

async fn ask(engine: &QueryEngine, question: &str, provider: Option<ProviderKind>) -> Result<()> {
    let schema = engine.describe().await?;
    let sql = QueryGenerator::new()
        .translate_to_sql(question, &schema, &LlmCredentials::from_env(), provider)
        .await?;

    println!("SQL: {}", sql);
    println!();

    let result = engine.execute(&sql).await?;
    print_result(&result)
}

fn print_result(result: &QueryResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&result.rows)?);
    println!(
        "{} rows in {} ms",
        result.row_count, result.execution_time_ms
    );
    Ok(())
}
