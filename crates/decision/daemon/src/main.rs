//! decisiond - constraint-aware decision ledger daemon
//!
//! - `serve`: HTTP transport for submission, witness, and operator control
//! - `verify`: offline chain and checkpoint verification of a file ledger
//! - `keygen`: create a checkpoint signing seed

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use decision_daemon::bootstrap::load_signer;
use decision_daemon::config::StorageConfig;
use decision_daemon::{DaemonConfig, DaemonError, Server};
use decision_ledger::{CheckpointSigner, FileLedger, SignedCheckpoint, VerificationReport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// decisiond CLI
#[derive(Parser)]
#[command(name = "decisiond")]
#[command(about = "Constraint-aware decision ledger daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DECISIOND_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "DECISIOND_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "DECISIOND_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP daemon
    Serve {
        /// Listen address
        #[arg(short, long, env = "DECISIOND_LISTEN_ADDR")]
        listen: Option<String>,
    },

    /// Verify a file ledger offline and print the report as JSON
    Verify {
        /// Ledger file; defaults to the configured file store
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Signed checkpoint (JSON) to check against the configured signing key
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Generate a checkpoint signing seed
    Keygen {
        /// Write the hex seed here
        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.log_json;
    init_tracing(&config.logging.level, config.logging.json);

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen_addr = listen.parse().map_err(|e| {
                    DaemonError::Config(format!("invalid listen address {listen}: {e}"))
                })?;
            }
            let server = Server::new(config)?;
            server.run().await?;
        }
        Command::Verify { ledger, checkpoint } => verify(&config, ledger, checkpoint)?,
        Command::Keygen { out } => keygen(&config, out)?,
    }
    Ok(())
}

fn verify(
    config: &DaemonConfig,
    ledger: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = match (ledger, &config.storage) {
        (Some(path), _) => path,
        (None, StorageConfig::File { path }) => path.clone(),
        (None, StorageConfig::Memory) => {
            bail!("no ledger file: pass --ledger or configure a file store")
        }
    };
    let store =
        FileLedger::open(&path).with_context(|| format!("failed to open {}", path.display()))?;

    let report = match checkpoint {
        Some(checkpoint) => {
            if config.checkpoint.signing_key.is_none() {
                bail!("checking a checkpoint needs checkpoint.signing_key in the configuration");
            }
            let raw = std::fs::read_to_string(&checkpoint)
                .with_context(|| format!("failed to read {}", checkpoint.display()))?;
            let signed: SignedCheckpoint =
                serde_json::from_str(&raw).context("checkpoint is not valid JSON")?;
            let key = load_signer(config)?.verifying_key();
            VerificationReport::build(&store, Some((&signed, &key)))?
        }
        None => VerificationReport::build(&store, None)?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid() {
        return Err(DaemonError::Verification(format!("ledger {}", path.display())).into());
    }
    Ok(())
}

fn keygen(config: &DaemonConfig, out: PathBuf) -> anyhow::Result<()> {
    let signer = CheckpointSigner::ephemeral(config.checkpoint.key_id.clone());

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&out)
        .with_context(|| format!("refusing to overwrite {}", out.display()))?;
    std::io::Write::write_all(&mut file, signer.seed_hex().as_bytes())?;

    tracing::info!(path = %out.display(), key_id = %signer.key_id(), "Wrote checkpoint signing seed");
    println!("{}", signer.verifying_key_hex());
    Ok(())
}
