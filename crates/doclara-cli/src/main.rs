//! doclara - explain photographed documents from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use secrecy::SecretString;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use doclara::config::{default_config_path, LogFormat, LoggingConfig};
use doclara::service::DEFAULT_HISTORY_LIMIT;
use doclara::workflow::{AnalysisRecorder, UserToken};
use doclara::{
    load_config_or_default, AnalyzeStage, ChatCompletionsClient, ClassifyStage, Config, Database,
    DocumentService, Identity, OcrProcessor, RetryPolicy, SqliteAnalysisRepository,
    SqliteCheckpointStore, WorkflowEngine,
};

#[derive(Parser)]
#[command(name = "doclara")]
#[command(about = "Plain-language explanations of legal and administrative documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.doclara/config.json)
    #[arg(long, global = true, env = "DOCLARA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config file
    #[arg(long, global = true, env = "DOCLARA_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a photographed document and explain it
    ///
    /// Needs a binary built with `--features ocr` (Tesseract); otherwise the
    /// image is validated but reported as unreadable.
    Analyze {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,
        #[arg(long)]
        user_id: String,
        /// Bearer token of the user, passed to storage
        #[arg(long, env = "DOCLARA_TOKEN", hide_env_values = true)]
        token: String,
        /// Continue or name a conversation thread
        #[arg(long)]
        thread_id: Option<String>,
    },
    /// Finish a thread that was interrupted mid-workflow
    Resume {
        thread_id: String,
        /// Owner of the thread
        #[arg(long)]
        user_id: String,
        #[arg(long, env = "DOCLARA_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// List stored analyses, newest first
    History {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show the stored analysis of one thread
    Show {
        thread_id: String,
        #[arg(long)]
        user_id: String,
    },
}

impl Commands {
    fn calls_model(&self) -> bool {
        matches!(self, Commands::Analyze { .. } | Commands::Resume { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .context("Could not determine the config path; pass --config")?;
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.logging)?;

    let service = build_service(&config, cli.database.clone(), cli.command.calls_model())?;

    let output = match cli.command {
        Commands::Analyze {
            image,
            user_id,
            token,
            thread_id,
        } => {
            let identity = Identity::new(user_id, UserToken::new(token))?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let result = service
                .analyze(bytes, thread_id.as_deref(), &identity)
                .await?;
            serde_json::to_value(result)?
        }
        Commands::Resume {
            thread_id,
            user_id,
            token,
        } => {
            let identity = Identity::new(user_id, UserToken::new(token))?;
            let result = service.resume(&thread_id, &identity).await?;
            serde_json::to_value(result)?
        }
        Commands::History {
            user_id,
            limit,
            offset,
        } => serde_json::to_value(service.history(&user_id, limit, offset).await?)?,
        Commands::Show { thread_id, user_id } => {
            let analysis = service.analysis_for_thread(&user_id, &thread_id).await?;
            serde_json::json!({ "user_id": user_id, "analysis": analysis })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Routes `log` records into `tracing` and writes everything to stderr.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn build_service(
    config: &Config,
    database: Option<PathBuf>,
    needs_model: bool,
) -> Result<DocumentService> {
    let db_path = database
        .or_else(|| config.resolved_database_path())
        .context("Could not determine the database path; pass --database")?;
    let db = Database::open(&db_path)?;

    let checkpoints = Arc::new(SqliteCheckpointStore::new(db.clone()));
    let analyses = Arc::new(SqliteAnalysisRepository::new(db));

    let api_key = if needs_model {
        config
            .model
            .resolve_api_key()
            .context("No model API key configured")?
    } else {
        // History lookups never reach the model.
        config
            .model
            .key_sources()
            .try_resolve()
            .ok()
            .flatten()
            .unwrap_or_else(|| SecretString::from(String::new()))
    };

    let classifier = ChatCompletionsClient::for_classification(&config.model, api_key.clone())?;
    let analyzer = ChatCompletionsClient::for_analysis(&config.model, api_key)?;
    info!(
        "Using models {} (classify) and {} (analyze)",
        classifier.model(),
        analyzer.model()
    );

    let engine = WorkflowEngine::new(
        ClassifyStage::new(Arc::new(classifier)),
        AnalyzeStage::new(Arc::new(analyzer)),
        checkpoints,
    )
    .with_hook(Arc::new(AnalysisRecorder::new(analyses.clone())));

    Ok(DocumentService::new(
        Arc::new(OcrProcessor::new(&config.ocr.languages)),
        Arc::new(engine),
        analyses,
        RetryPolicy::from(&config.retry),
    ))
}
