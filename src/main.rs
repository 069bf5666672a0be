use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wallet_tracker::config::AppConfig;
use wallet_tracker::utils::{format_coin_amount, BTC_DECIMALS};
use wallet_tracker::wallet::WalletService;
use wallet_tracker::wallet::sync::SyncStatus;

#[derive(Parser)]
#[command(name = "wallet-tracker")]
#[command(about = "Tracks ledger addresses and mirrors their history from a block explorer")]
struct Cli {
	/// Configuration file path
	#[arg(short, long, default_value = "wallet-tracker.toml")]
	config: PathBuf,

	/// Override log level (e.g. "debug" or "wallet_tracker=trace")
	#[arg(long)]
	log_level: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Start tracking an address
	Add { address: String },
	/// Stop tracking an address and delete its stored transactions
	Remove { address: String },
	/// Sync every tracked address with the explorer
	Sync,
	/// Print the stored balance of an address
	Balance { address: String },
	/// Print the stored transactions of an address as JSON, newest first
	Transactions { address: String },
	/// List tracked addresses
	List,
	/// Print balance and transactions of every tracked address as JSON
	Data,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	init_logging(cli.log_level.as_deref())?;

	let config = AppConfig::load(&cli.config)?;
	if !cli.config.exists() {
		warn!("Config file not found, using defaults: {}", cli.config.display());
	}

	let service = WalletService::from_config(&config).context("initializing wallet service")?;
	let mut stdout = std::io::stdout().lock();

	match cli.command {
		Command::Add { address } => {
			if service.add_address(&address).await? {
				writeln!(stdout, "{} is already tracked", address)?;
			} else {
				writeln!(stdout, "Tracking {}", address)?;
			}
		}
		Command::Remove { address } => {
			if service.remove_address(&address).await? {
				writeln!(stdout, "Removed {}", address)?;
			} else {
				writeln!(stdout, "{} was not tracked", address)?;
			}
		}
		Command::Sync => {
			let handle = service.sync_all();
			info!("Sync pass {} started. Press Ctrl+C to cancel.", handle.pass_id());

			let status = tokio::select! {
				status = handle.wait() => status,
				_ = tokio::signal::ctrl_c() => {
					info!("Cancelling sync pass {}", handle.pass_id());
					handle.cancel();
					handle.wait().await
				}
			};

			match status {
				SyncStatus::Completed(summary) => writeln!(
					stdout,
					"Synced {} addresses ({} failed), {} new transactions at {}",
					summary.addresses_synced,
					summary.addresses_failed,
					summary.transactions_inserted,
					summary.finished_at.to_rfc3339()
				)?,
				SyncStatus::Cancelled => writeln!(stdout, "Sync cancelled, nothing was written")?,
				SyncStatus::Failed(message) => anyhow::bail!("sync failed: {}", message),
				SyncStatus::Running => anyhow::bail!("sync pass ended without a final status"),
			}
		}
		Command::Balance { address } => {
			let balance = service.balance(&address).await?;
			writeln!(
				stdout,
				"{}: {} BTC",
				address,
				format_coin_amount(balance, BTC_DECIMALS)
			)?;
		}
		Command::Transactions { address } => {
			let body = service.transactions(&address).await?;
			stdout.write_all(&body)?;
			writeln!(stdout)?;
		}
		Command::List => {
			for address in service.list_addresses().await? {
				writeln!(stdout, "{}", address)?;
			}
		}
		Command::Data => {
			let data = service.wallet_data().await?;
			serde_json::to_writer_pretty(&mut stdout, &data)?;
			writeln!(stdout)?;
		}
	}

	Ok(())
}

fn init_logging(log_level: Option<&str>) -> Result<()> {
	let filter = match log_level {
		Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
		None => EnvFilter::from_default_env()
			.add_directive("wallet_tracker=info".parse()?)
			.add_directive(tracing::Level::WARN.into()),
	};

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	Ok(())
}
