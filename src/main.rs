use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use wordbridge::language::{default_languages, LanguageRegistry};
use wordbridge::{build_engine, init_tracing, open_store, Config, ErrorKind, TranslateError};

#[derive(Parser, Debug)]
#[command(
    name = "wordbridge",
    version,
    about = "Translate words and sentences with a cached text oracle"
)]
struct Cli {
    /// JSON config file (defaults apply when absent)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate text into the language with the given id
    Translate {
        #[arg(short = 't', long = "text")]
        text: String,
        /// Target language id (see `languages`)
        #[arg(long = "to")]
        to: i64,
        /// Print stage latency summary to stderr
        #[arg(long = "timings")]
        timings: bool,
    },
    /// List known languages
    Languages {
        #[arg(long = "id")]
        id: Option<i64>,
    },
    /// Insert the default language set (existing rows are kept)
    Seed,
    /// Show row counts of the cache tables
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err:#}");
            let user_error = err
                .downcast_ref::<TranslateError>()
                .is_some_and(|e| e.kind() == ErrorKind::UserInput);
            if user_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    init_tracing(&config.log);
    config.log_source();

    let store = open_store(&config)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    match cli.command {
        Command::Translate { text, to, timings } => {
            let engine = build_engine(&config, store).context("oracle client unavailable")?;
            let result = engine.get_translation(&text, to).await;
            // Let a fresh generation reach the cache before the process exits.
            engine.shutdown().await;
            if timings {
                eprintln!("{}", serde_json::to_string_pretty(&engine.metrics_summary())?);
            }
            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
        Command::Languages { id } => {
            let languages = store.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&languages)?);
        }
        Command::Seed => {
            let inserted = store.seed_languages(default_languages()).await?;
            println!("inserted {inserted} languages");
        }
        Command::Stats => {
            let counts = store.table_counts().await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
    }
    Ok(())
}
