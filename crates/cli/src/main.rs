//! TokenGate CLI - demo driver and concurrency stress check for the limiter

mod burst;
mod logging;
mod settings;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use logging::LogFormat;
use std::path::PathBuf;
use std::time::Duration;
use tokengate_core::Limiter;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "tokengate")]
#[command(about = "Per-client token-bucket admission control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML/JSON/YAML) with a `rate` key
    #[arg(long, global = true, env = "TOKENGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Requests per second per client (also the burst size); overrides config
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    rate: Option<i64>,

    /// Log output format
    #[arg(long, global = true, value_enum, env = "TOKENGATE_LOG_FORMAT")]
    #[arg(default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Print allowed/denied decisions for a scripted sequence of requests
    Simulate {
        /// Clients, the first one gets the spaced sequence
        #[arg(long, value_delimiter = ',', default_value = "clientA,clientB")]
        clients: Vec<String>,

        /// Requests sent by the first client before waiting
        #[arg(short = 'k', long, default_value = "5")]
        requests: usize,

        /// Delay between the first client's requests (ms)
        #[arg(long, default_value = "100")]
        gap_ms: u64,

        /// Wait before the first client's final request (ms)
        #[arg(long, default_value = "1000")]
        wait_ms: u64,
    },

    /// Fire concurrent decisions on one client and check the token-bucket bound
    Burst {
        /// Number of concurrent callers
        #[arg(short, long, default_value = "200")]
        threads: usize,

        /// Client identifier
        #[arg(long, default_value = "concurrentClient")]
        client: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_format)?;
    info!("TokenGate v{} starting...", VERSION);

    let limiter_config = settings::load(cli.config.as_deref(), cli.rate)?;
    let limiter = Limiter::from_config(&limiter_config);

    match cli.command {
        Commands::Simulate {
            clients,
            requests,
            gap_ms,
            wait_ms,
        } => {
            let args = simulate::SimulateArgs {
                clients,
                requests,
                gap: Duration::from_millis(gap_ms),
                wait: Duration::from_millis(wait_ms),
            };
            simulate::run(&limiter, &args);
        }

        Commands::Burst { threads, client } => {
            let report = burst::run(&limiter, &client, threads);
            burst::print(&report);
            if !report.within_bound() {
                anyhow::bail!(
                    "{} requests allowed, bound was {}",
                    report.allowed,
                    report.bound
                );
            }
        }
    }

    Ok(())
}
