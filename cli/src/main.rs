use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;

use stakeview_chain::{Address, MockChain, MockPolicy, StakingChain};
use stakeview_engine::{projection, EngineConfig};
use stakeview_reconciler::{StakingClient, UnstakeOutcome};

/// Stakeview staking engine CLI
#[derive(Parser)]
#[command(name = "stakeview", version, about = "Staking ledger engine command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Project the reward for an amount and duration
    Project {
        /// Amount to stake, in display units
        #[arg(long)]
        amount: String,

        /// Duration label, e.g. "30 Days"
        #[arg(long)]
        duration: String,

        /// Resolve against the test-mode table
        #[arg(long)]
        test_mode: bool,

        /// Path to the engine configuration file
        #[arg(long, default_value = "stakeview.json")]
        config: PathBuf,
    },

    /// Run the engine against the in-memory mock chain
    Demo {
        /// Path to the engine configuration file
        #[arg(long, default_value = "stakeview.json")]
        config: PathBuf,

        /// Account address (hex, with or without 0x prefix)
        #[arg(long, default_value = "0x0101010101010101010101010101010101010101")]
        account: Address,

        /// Start the mock contract in test mode
        #[arg(long)]
        test_mode: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default local configuration
    Init {
        /// Output file
        #[arg(short, long, default_value = "stakeview.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate
        #[arg(short, long, default_value = "stakeview.json")]
        file: PathBuf,
    },
}

fn load_config(path: &Path) -> EngineConfig {
    EngineConfig::from_file(path).unwrap_or_else(|e| {
        tracing::warn!("Could not load configuration file: {e}, using local defaults");
        EngineConfig::default_local()
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Init { output } => {
                let config = EngineConfig::default_local();
                config.to_file(&output)?;
                println!("Wrote default configuration to {}", output.display());
            }
            ConfigCommands::Validate { file } => match EngineConfig::from_file(&file) {
                Ok(config) => {
                    println!("Configuration is valid");
                    println!("  contract:       {}", config.contract_address);
                    println!("  token decimals: {}", config.token_decimals);
                    println!("  poll interval:  {}s", config.poll_interval_secs);
                    println!("  normal durations:");
                    for p in config.policies.normal.policies() {
                        println!(
                            "    {:<10} {:>5.1}% APR, locks for {}s",
                            p.label, p.apr_percent, p.lock_secs
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Configuration is invalid: {e}");
                    std::process::exit(1);
                }
            },
        },

        Commands::Project {
            amount,
            duration,
            test_mode,
            config,
        } => {
            let config = load_config(&config);
            let policy = config.policies.resolve(&duration, test_mode)?;
            let projected = projection::project(&amount, policy, test_mode, chrono::Utc::now());
            println!("Staking {} under {:?}:", projected.amount, policy.label);
            println!("  APR:             {:.1}%", policy.apr_percent);
            println!("  projected value: {:.6}", projected.projected_reward);
            println!("  unlocks at:      {}", projected.projected_unlock_at);
        }

        Commands::Demo {
            config,
            account,
            test_mode,
        } => {
            let config = load_config(&config);
            run_demo(config, account, test_mode).await?;
        }
    }

    Ok(())
}

/// Drive the full engine against the in-memory mock contract: seed one
/// stake, then print the reconciled ledger until interrupted.
async fn run_demo(
    config: EngineConfig,
    account: Address,
    test_mode: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // The mock contract accepts labels from both tables; its own
    // test-mode flag decides how rewards accrue.
    let policies = config
        .policies
        .normal
        .policies()
        .iter()
        .chain(config.policies.test_mode.policies())
        .map(|p| MockPolicy::new(p.label.clone(), p.apr_percent, p.lock_secs))
        .collect();
    let chain = Arc::new(MockChain::new(policies, test_mode));

    let book = config.policies.clone();
    let client = StakingClient::connect(chain, config, account).await?;
    tracing::info!(
        account = %client.account(),
        test_mode = client.test_mode(),
        "demo client connected"
    );

    println!("Projected rewards for 1000 tokens:");
    for policy in book.active(test_mode).policies() {
        let projected = client.project("1000", &policy.label)?;
        println!(
            "  {:<10} {:>5.1}% APR -> {:.4}, unlocks {}",
            policy.label, policy.apr_percent, projected.projected_reward,
            projected.projected_unlock_at
        );
    }

    // Seed one position so the ledger has something to reconcile.
    let label = book.active(test_mode).policies()[0].label.clone();
    let receipt = client.stake(&label, "250").await?;
    tracing::info!(tx_hash = %receipt.tx_hash, duration = %label, "seed stake submitted");

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_snapshot(&client);
                if test_mode {
                    advance_lifecycle(&client).await;
                }
            }

            // Wait for shutdown signal (SIGINT/SIGTERM).
            _ = signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                break;
            }
        }
    }

    client.shutdown().await;
    tracing::info!("demo shutting down gracefully");
    Ok(())
}

/// In test mode the lock is short enough that one demo run walks the
/// whole lifecycle: claim rewards as soon as they land, withdraw the
/// principal once the lock expires.
async fn advance_lifecycle<C: StakingChain>(client: &StakingClient<C>) {
    let snapshot = client.snapshot();
    for position in &snapshot.active {
        let status = client.eligibility(position);
        if status.can_claim {
            match client.claim(position.id).await {
                Ok(receipt) => {
                    tracing::info!(tx_hash = %receipt.tx_hash, id = position.id, "rewards claimed")
                }
                Err(error) => tracing::warn!(%error, id = position.id, "claim failed"),
            }
        } else if status.can_unstake && !status.early_penalty_warning {
            match client.unstake(position.id, |_| true).await {
                Ok(UnstakeOutcome::Submitted(receipt)) => {
                    tracing::info!(tx_hash = %receipt.tx_hash, id = position.id, "principal withdrawn")
                }
                Ok(UnstakeOutcome::Declined) => {}
                Err(error) => tracing::warn!(%error, id = position.id, "unstake failed"),
            }
        }
    }
}

fn print_snapshot<C: StakingChain>(client: &StakingClient<C>) {
    if let Some(error) = client.last_fetch_error() {
        tracing::warn!(%error, "last reconciliation cycle failed");
    }
    let snapshot = client.snapshot();
    println!(
        "ledger: {} active, {} historical",
        snapshot.active.len(),
        snapshot.historical.len()
    );
    for p in &snapshot.active {
        let status = client.eligibility(p);
        println!(
            "  #{:<3} {:>12.4} @ {:>4.1}% APR, rewards {:.4}{}{}",
            p.id,
            p.principal,
            p.apr,
            p.rewards,
            if status.can_claim { ", claimable" } else { "" },
            if status.early_penalty_warning { ", locked" } else { "" },
        );
    }
}
