use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use customer_purge::{
    config::PurgeServiceConfig,
    db::DbPool,
    observability,
    purge::{self, FixedBatchSize, PurgeJob},
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for the anonymous customer purge
#[derive(Parser, Debug)]
#[command(version, about = "Purge expired anonymous customers", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "customer-purge.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run one purge and print its summary as JSON
    Run {
        /// Use this batch size instead of the stored setting
        #[arg(long)]
        batch_size: Option<i64>,
        /// Scan and partition only; delete nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Purge on the configured interval until interrupted
    Worker,
    /// Run database migrations and exit
    Migrate,
    /// Store the runtime batch size read by the next run
    SetBatchSize {
        /// New batch size (must be positive)
        size: i64,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Command::Schema { output } = &args.command {
        return run_schema_export(output.as_deref());
    }

    let config = match PurgeServiceConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::error!(error = %e, "Failed to initialize metrics");
        return ExitCode::FAILURE;
    }

    let db = match connect(&config, matches!(args.command, Command::Migrate)).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    let code = match args.command {
        Command::Run {
            batch_size,
            dry_run,
        } => run_once(&db, &config, batch_size, dry_run).await,
        Command::Worker => {
            run_worker(Arc::clone(&db), &config).await;
            ExitCode::SUCCESS
        }
        Command::Migrate => {
            tracing::info!("Database migrations completed successfully");
            ExitCode::SUCCESS
        }
        Command::SetBatchSize { size } => set_batch_size(&db, &config, size).await,
        Command::Schema { .. } => ExitCode::SUCCESS,
    };

    db.close().await;
    code
}

/// Connect and apply migrations when configured (or when migrating explicitly).
async fn connect(
    config: &PurgeServiceConfig,
    force_migrations: bool,
) -> customer_purge::db::DbResult<DbPool> {
    let db = DbPool::from_config(&config.database).await?;
    if force_migrations || config.database.run_migrations() {
        db.run_migrations().await?;
    }
    Ok(db)
}

async fn run_once(
    db: &DbPool,
    config: &PurgeServiceConfig,
    batch_size: Option<i64>,
    dry_run: bool,
) -> ExitCode {
    let mut job = PurgeJob::from_config(db, &config.purge);
    if let Some(size) = batch_size {
        job = job.with_batch_size(Arc::new(FixedBatchSize(size)));
    }
    if dry_run {
        job = job.with_dry_run(true);
    }

    match job.run().await {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize run summary"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Purge aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_worker(db: Arc<DbPool>, config: &PurgeServiceConfig) {
    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(purge::worker::start_purge_worker(
        db,
        config.purge.clone(),
        shutdown.clone(),
    ));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping after the current run");
    shutdown.cancel();

    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Purge worker task failed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn set_batch_size(db: &DbPool, config: &PurgeServiceConfig, size: i64) -> ExitCode {
    if size <= 0 {
        eprintln!("Batch size must be positive, got {size}");
        return ExitCode::FAILURE;
    }

    let key = &config.purge.batch_size_setting;
    match db.settings().set(key, &size.to_string()).await {
        Ok(()) => {
            tracing::info!(key = %key, size, "Stored purge batch size");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to store {key}: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<&std::path::Path>) -> ExitCode {
    let content = match PurgeServiceConfig::json_schema_string() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to serialize config schema: {e}");
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(path) => match std::fs::write(path, &content) {
            Ok(()) => {
                eprintln!("Config JSON schema written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to write to {}: {}", path.display(), e);
                ExitCode::FAILURE
            }
        },
        None => {
            println!("{content}");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(not(feature = "json-schema"))]
fn run_schema_export(_output: Option<&std::path::Path>) -> ExitCode {
    eprintln!("Error: JSON schema export requires the 'json-schema' feature");
    ExitCode::FAILURE
}
