mod config_commands;
mod job_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "autocron", about = "autocron: idempotent crontab registration", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./autocron.toml, then the user config dir).
    #[arg(long, global = true, env = "AUTOCRON_CONFIG")]
    config: Option<PathBuf>,

    /// Manage this crontab-format file instead of the configured store.
    #[arg(long, global = true, env = "AUTOCRON_CRONTAB_FILE")]
    crontab_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register (or refresh) one job.
    Register(job_commands::RegisterArgs),
    /// Register every job declared in the config file.
    Sync,
    /// List crontab entries created by autocron.
    List(job_commands::ListArgs),
    /// Remove a job's entries.
    Remove(job_commands::JobArgs),
    /// Print the fingerprint a job would be registered under.
    Fingerprint(job_commands::JobArgs),
    /// Validate the config file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays pipeable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "autocron starting");

    if let Commands::Check { verbose } = cli.command {
        return config_commands::check(cli.config.as_deref(), verbose);
    }

    let ctx = job_commands::Context::load(cli.config.as_deref(), cli.crontab_file.as_deref())?;
    match cli.command {
        Commands::Register(args) => job_commands::register(&ctx, args).await,
        Commands::Sync => job_commands::sync(&ctx).await,
        Commands::List(args) => job_commands::list(&ctx, args).await,
        Commands::Remove(args) => job_commands::remove(&ctx, args).await,
        Commands::Fingerprint(args) => job_commands::fingerprint(&ctx, args),
        Commands::Check { .. } => Ok(()),
    }
}
