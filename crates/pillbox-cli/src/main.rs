//! Binary entry point for `pillbox`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pillbox_cli::commands;
use pillbox_core::constants::DEFAULT_QR_MAX_PAYLOAD;
use tracing_subscriber::EnvFilter;

/// Pillbox - RFID medicine box controller tools.
#[derive(Parser)]
#[command(name = "pillbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the controller on the wall clock until Ctrl-C.
    Run {
        /// Controller configuration (TOML).
        #[arg(short, long, env = "PILLBOX_CONFIG")]
        config: PathBuf,

        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Replay a scenario against mock devices.
    Simulate {
        /// Controller configuration (TOML).
        #[arg(short, long, env = "PILLBOX_CONFIG")]
        config: PathBuf,

        /// Scenario to replay (JSON).
        #[arg(short, long)]
        scenario: PathBuf,

        /// Keep the log in memory instead of writing to log_dir.
        #[arg(long)]
        in_memory: bool,

        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Print a day's log.
    Show {
        /// Directory of daily log files.
        #[arg(short, long, env = "PILLBOX_LOG_DIR")]
        log_dir: PathBuf,

        /// Day to show (YYYY-MM-DD), today by default.
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Print the QR payload of a day's log.
    Qr {
        /// Directory of daily log files.
        #[arg(short, long, env = "PILLBOX_LOG_DIR")]
        log_dir: PathBuf,

        /// Day to encode (YYYY-MM-DD), today by default.
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Payload bound in bytes.
        #[arg(short, long, default_value_t = DEFAULT_QR_MAX_PAYLOAD)]
        max_len: usize,
    },

    /// List the days that have a log.
    Dates {
        /// Directory of daily log files.
        #[arg(short, long, env = "PILLBOX_LOG_DIR")]
        log_dir: PathBuf,
    },

    /// Validate a configuration file.
    CheckConfig {
        /// Controller configuration (TOML).
        #[arg(short, long, env = "PILLBOX_CONFIG")]
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn shutdown_signal(limit: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    match limit {
        Some(limit) => {
            tokio::select! {
                () = ctrl_c => {}
                () = tokio::time::sleep(limit) => {}
            }
        }
        None => ctrl_c.await,
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            config,
            duration_secs,
            json,
        } => {
            let limit = duration_secs.map(Duration::from_secs);
            let mut failed = None;
            commands::run(&config, shutdown_signal(limit), |event| {
                if json {
                    match serde_json::to_string(event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => failed = Some(e),
                    }
                } else {
                    println!("{event}");
                }
            })
            .await?;
            if let Some(e) = failed {
                return Err(e.into());
            }
        }
        Commands::Simulate {
            config,
            scenario,
            in_memory,
            json,
        } => {
            for event in commands::simulate(&config, &scenario, in_memory).await? {
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!("{event}");
                }
            }
        }
        Commands::Show { log_dir, date } => {
            println!("{}", commands::show(&log_dir, date).await?);
        }
        Commands::Qr {
            log_dir,
            date,
            max_len,
        } => {
            println!("{}", commands::qr_payload(&log_dir, date, max_len).await?);
        }
        Commands::Dates { log_dir } => {
            for date in commands::dates(&log_dir).await? {
                println!("{date}");
            }
        }
        Commands::CheckConfig { config } => {
            print!("{}", commands::check_config(&config)?);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
