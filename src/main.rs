//! Basket backtest - main entry point
//!
//! This binary provides two subcommands:
//! - backtest: Evaluate baskets over a period (lumpsum or SIP)
//! - rank: Rank baskets by return within each calendar year

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::QueryArgs;

#[derive(Parser, Debug)]
#[command(name = "basket-backtest")]
#[command(about = "Mutual fund basket backtesting with drawdown, XIRR and yearly rankings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate baskets over a period
    Backtest {
        #[command(flatten)]
        query: QueryArgs,

        /// Sort results by column (name, final, abs, annualized, drawdown)
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort ascending instead of descending
        #[arg(long)]
        ascending: bool,
    },

    /// Rank baskets within each calendar year
    Rank {
        #[command(flatten)]
        query: QueryArgs,
    },
}

impl Commands {
    /// Log file prefix, and whether logs must stay off stdout
    fn log_target(&self) -> (&'static str, bool) {
        match self {
            Commands::Backtest { query, .. } => ("backtest", query.json),
            Commands::Rank { query } => ("rank", query.json),
        }
    }
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // JSON output owns stdout
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = cli.command.log_target();

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            query,
            sort_by,
            ascending,
        } => commands::backtest::run(query, sort_by, ascending),

        Commands::Rank { query } => commands::rank::run(query),
    }
}
