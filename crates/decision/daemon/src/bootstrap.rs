//! Wires configuration into a running decision engine.

use std::path::Path;
use std::sync::Arc;

use decision_degradation::{
    DegradationMachine, FileIncidentLog, IncidentLog, MemoryIncidentLog,
};
use decision_engine::{
    AcceptAnyPayload, DecisionEngine, JsonObjectPayload, NonEmptyPayload, PayloadValidator,
    StaticTokenAuthority,
};
use decision_ledger::{CheckpointSigner, FileLedger, InMemoryLedger, LedgerStore};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{DaemonConfig, PayloadFormat, StorageConfig};
use crate::error::{DaemonError, DaemonResult};

/// Constraint-declaration channel manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclarationManifest {
    pub channel: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Why the declaration channel could not be established, if it could not.
pub fn declaration_channel_failure(manifest: Option<&Path>) -> Option<String> {
    let path = manifest?;
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => return Some(format!("manifest {} unreadable: {e}", path.display())),
    };
    match serde_json::from_str::<DeclarationManifest>(&raw) {
        Ok(manifest) if manifest.channel.trim().is_empty() => {
            Some(format!("manifest {} names no channel", path.display()))
        }
        Ok(manifest) => {
            info!(
                channel = %manifest.channel,
                keys = manifest.keys.len(),
                "Constraint-declaration channel established"
            );
            None
        }
        Err(e) => Some(format!("manifest {} is malformed: {e}", path.display())),
    }
}

pub fn open_store(storage: &StorageConfig) -> DaemonResult<Arc<dyn LedgerStore>> {
    Ok(match storage {
        StorageConfig::Memory => {
            warn!("Using in-memory ledger; entries will not survive restart");
            Arc::new(InMemoryLedger::new())
        }
        StorageConfig::File { path } => Arc::new(FileLedger::open(path)?),
    })
}

pub fn load_signer(config: &DaemonConfig) -> DaemonResult<CheckpointSigner> {
    match &config.checkpoint.signing_key {
        Some(path) => {
            let seed = std::fs::read_to_string(path)?;
            Ok(CheckpointSigner::from_hex_seed(
                config.checkpoint.key_id.clone(),
                &seed,
            )?)
        }
        None => {
            warn!("No checkpoint signing key configured; using an ephemeral key");
            Ok(CheckpointSigner::ephemeral(config.checkpoint.key_id.clone()))
        }
    }
}

fn payload_validator(format: PayloadFormat) -> Arc<dyn PayloadValidator> {
    match format {
        PayloadFormat::Any => Arc::new(AcceptAnyPayload),
        PayloadFormat::NonEmpty => Arc::new(NonEmptyPayload),
        PayloadFormat::JsonObject => Arc::new(JsonObjectPayload),
    }
}

/// Build and start the engine described by `config`. Must run inside a tokio
/// runtime.
pub fn build_engine(config: &DaemonConfig) -> DaemonResult<DecisionEngine> {
    let store = open_store(&config.storage)?;

    let incidents: Arc<dyn IncidentLog> = match &config.degradation.incident_log {
        Some(path) => Arc::new(FileIncidentLog::open(path)?),
        None => Arc::new(MemoryIncidentLog::new()),
    };

    let degradation = config.degradation_config();
    let machine = match declaration_channel_failure(config.declaration.manifest.as_deref()) {
        Some(reason) => {
            warn!(reason = %reason, "Starting Degraded: no constraint-declaration channel");
            DegradationMachine::start_degraded(degradation, incidents, reason)?
        }
        None => DegradationMachine::new(degradation, incidents)?,
    };

    let authority = StaticTokenAuthority::new(config.authority.tokens.iter().cloned());
    if authority.is_empty() {
        warn!("No authority tokens configured; every submission will be rejected");
    }

    let engine = DecisionEngine::builder(store, Arc::new(authority))
        .payload_validator(payload_validator(config.engine.payload_format))
        .degradation(Arc::new(machine))
        .checkpoint_signer(load_signer(config)?)
        .config(config.engine_config())
        .start()
        .map_err(DaemonError::from)?;

    info!(
        state = %engine.state(),
        key_id = %engine.checkpoint_key_id(),
        "Decision engine ready"
    );
    Ok(engine)
}
