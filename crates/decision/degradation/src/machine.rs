use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use decision_types::{RejectionKind, SubmitOutcome, SystemState};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::DegradationError;
use crate::incident::{IncidentKind, IncidentLog, IncidentRecord};

/// Hysteresis thresholds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Consecutive degraded-origin or failed outcomes before `Active -> Degraded`.
    pub degrade_after: u32,
    /// Consecutive normal outcomes before `Degraded -> Active`.
    pub recover_after: u32,
    /// A durable write slower than this counts as a failed outcome.
    pub slow_write_threshold_ms: Option<u64>,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            degrade_after: 1,
            recover_after: 3,
            slow_write_threshold_ms: Some(250),
        }
    }
}

impl DegradationConfig {
    pub fn validate(&self) -> Result<(), DegradationError> {
        if self.degrade_after == 0 {
            return Err(DegradationError::InvalidConfig(
                "degrade_after must be at least 1".into(),
            ));
        }
        if self.recover_after == 0 {
            return Err(DegradationError::InvalidConfig(
                "recover_after must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Why a transition happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionCause {
    DeclarationChannelUnavailable { reason: String },
    DegradedOrigin { consecutive: u32 },
    LedgerFailure { kind: RejectionKind, consecutive: u32 },
    SlowWrite {
        latency_ms: u64,
        threshold_ms: u64,
        consecutive: u32,
    },
    Recovered { consecutive_normal: u32 },
    SequenceConflict { detail: String },
    IntegrityFailure { detail: String },
    OperatorHalt { operator: String, reason: String },
    OperatorReset { operator: String },
}

/// Conditions that force `Halted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HaltCause {
    SequenceConflict { detail: String },
    IntegrityFailure { detail: String },
    Operator { operator: String, reason: String },
}

impl HaltCause {
    fn incident_kind(&self) -> IncidentKind {
        match self {
            HaltCause::SequenceConflict { .. } => IncidentKind::SequenceConflict,
            HaltCause::IntegrityFailure { .. } => IncidentKind::IntegrityFailure,
            HaltCause::Operator { .. } => IncidentKind::OperatorHalt,
        }
    }

    fn detail(&self) -> String {
        match self {
            HaltCause::SequenceConflict { detail } | HaltCause::IntegrityFailure { detail } => {
                detail.clone()
            }
            HaltCause::Operator { operator, reason } => format!("{operator}: {reason}"),
        }
    }
}

impl From<HaltCause> for TransitionCause {
    fn from(cause: HaltCause) -> Self {
        match cause {
            HaltCause::SequenceConflict { detail } => TransitionCause::SequenceConflict { detail },
            HaltCause::IntegrityFailure { detail } => TransitionCause::IntegrityFailure { detail },
            HaltCause::Operator { operator, reason } => {
                TransitionCause::OperatorHalt { operator, reason }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub from: SystemState,
    pub to: SystemState,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}

struct MachineState {
    state: SystemState,
    consecutive_failures: u32,
    consecutive_normal: u32,
    history: Vec<TransitionEvent>,
}

/// Sole owner of [`SystemState`].
///
/// Every change is a [`TransitionEvent`] appended to the history and emitted
/// through `tracing`. Readers use [`state`](Self::state) or a
/// [`subscribe`](Self::subscribe) receiver; neither takes the machine lock.
pub struct DegradationMachine {
    config: DegradationConfig,
    inner: Mutex<MachineState>,
    state_tx: watch::Sender<SystemState>,
    incidents: Arc<dyn IncidentLog>,
}

impl DegradationMachine {
    /// Start `Active`.
    pub fn new(
        config: DegradationConfig,
        incidents: Arc<dyn IncidentLog>,
    ) -> Result<Self, DegradationError> {
        config.validate()?;
        let (state_tx, _) = watch::channel(SystemState::Active);
        Ok(Self {
            config,
            inner: Mutex::new(MachineState {
                state: SystemState::Active,
                consecutive_failures: 0,
                consecutive_normal: 0,
                history: Vec::new(),
            }),
            state_tx,
            incidents,
        })
    }

    /// Start `Degraded` because no constraint-declaration channel could be
    /// established.
    pub fn start_degraded(
        config: DegradationConfig,
        incidents: Arc<dyn IncidentLog>,
        reason: impl Into<String>,
    ) -> Result<Self, DegradationError> {
        let machine = Self::new(config, incidents)?;
        {
            let mut inner = machine.lock()?;
            machine.transition(
                &mut inner,
                SystemState::Degraded,
                TransitionCause::DeclarationChannelUnavailable {
                    reason: reason.into(),
                },
            );
        }
        Ok(machine)
    }

    pub fn config(&self) -> &DegradationConfig {
        &self.config
    }

    pub fn state(&self) -> SystemState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state_tx.subscribe()
    }

    pub fn history(&self) -> Result<Vec<TransitionEvent>, DegradationError> {
        Ok(self.lock()?.history.clone())
    }

    /// Apply one submit outcome. Validation rejections leave state and
    /// counters untouched; `SequenceConflict` halts.
    pub fn record(&self, outcome: SubmitOutcome) -> Result<SystemState, DegradationError> {
        match outcome {
            SubmitOutcome::Rejected(kind) if kind.is_fatal() => {
                self.halt(HaltCause::SequenceConflict {
                    detail: "sequence conflict reported by submit path".into(),
                })
            }
            SubmitOutcome::Rejected(kind) if !kind.counts_toward_degradation() => {
                debug!(kind = kind.code(), "Validation rejection; state unchanged");
                Ok(self.state())
            }
            SubmitOutcome::Rejected(kind) => {
                let mut inner = self.lock()?;
                self.register_failure(&mut inner, |consecutive| TransitionCause::LedgerFailure {
                    kind,
                    consecutive,
                });
                Ok(inner.state)
            }
            SubmitOutcome::DegradedOrigin => {
                let mut inner = self.lock()?;
                self.register_failure(&mut inner, |consecutive| TransitionCause::DegradedOrigin {
                    consecutive,
                });
                Ok(inner.state)
            }
            SubmitOutcome::Normal => {
                let mut inner = self.lock()?;
                self.register_normal(&mut inner);
                Ok(inner.state)
            }
        }
    }

    /// Apply a committed entry's outcome together with its write latency. A
    /// write over the slow threshold counts as a failure whatever the outcome.
    pub fn record_commit(
        &self,
        outcome: SubmitOutcome,
        write_latency: Duration,
    ) -> Result<SystemState, DegradationError> {
        let latency_ms = u64::try_from(write_latency.as_millis()).unwrap_or(u64::MAX);
        match self.config.slow_write_threshold_ms {
            Some(threshold_ms) if latency_ms > threshold_ms => {
                let mut inner = self.lock()?;
                if inner.state.is_halted() {
                    return Ok(inner.state);
                }
                warn!(latency_ms, threshold_ms, "Ledger write exceeded latency threshold");
                self.register_failure(&mut inner, |consecutive| TransitionCause::SlowWrite {
                    latency_ms,
                    threshold_ms,
                    consecutive,
                });
                Ok(inner.state)
            }
            _ => self.record(outcome),
        }
    }

    /// Force `Halted` and write an incident record. Halting while already
    /// halted records the incident without a new transition.
    pub fn halt(&self, cause: HaltCause) -> Result<SystemState, DegradationError> {
        let mut inner = self.lock()?;
        let before = inner.state;

        self.write_incident(IncidentRecord::new(
            cause.incident_kind(),
            before,
            SystemState::Halted,
            cause.detail(),
        ));

        if before.is_halted() {
            warn!(cause = ?cause, "Halt requested while already halted");
            return Ok(SystemState::Halted);
        }

        inner.consecutive_failures = 0;
        inner.consecutive_normal = 0;
        self.transition(&mut inner, SystemState::Halted, cause.into());
        Ok(SystemState::Halted)
    }

    /// Manual operator reset out of `Halted`. The system resumes `Degraded`
    /// and must earn `Active` through the normal hysteresis.
    pub fn reset(&self, operator: &str) -> Result<SystemState, DegradationError> {
        let mut inner = self.lock()?;
        if !inner.state.is_halted() {
            return Err(DegradationError::NotHalted(inner.state));
        }

        self.write_incident(IncidentRecord::new(
            IncidentKind::OperatorReset,
            SystemState::Halted,
            SystemState::Degraded,
            operator,
        ));

        inner.consecutive_failures = 0;
        inner.consecutive_normal = 0;
        self.transition(
            &mut inner,
            SystemState::Degraded,
            TransitionCause::OperatorReset {
                operator: operator.to_string(),
            },
        );
        Ok(SystemState::Degraded)
    }

    fn register_failure(
        &self,
        inner: &mut MachineState,
        cause: impl FnOnce(u32) -> TransitionCause,
    ) {
        if inner.state.is_halted() {
            return;
        }
        inner.consecutive_normal = 0;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == SystemState::Active
            && inner.consecutive_failures >= self.config.degrade_after
        {
            let cause = cause(inner.consecutive_failures);
            inner.consecutive_failures = 0;
            self.transition(inner, SystemState::Degraded, cause);
        }
    }

    fn register_normal(&self, inner: &mut MachineState) {
        if inner.state.is_halted() {
            return;
        }
        inner.consecutive_failures = 0;
        inner.consecutive_normal = inner.consecutive_normal.saturating_add(1);

        if inner.state == SystemState::Degraded
            && inner.consecutive_normal >= self.config.recover_after
        {
            let consecutive_normal = inner.consecutive_normal;
            inner.consecutive_normal = 0;
            self.transition(
                inner,
                SystemState::Active,
                TransitionCause::Recovered { consecutive_normal },
            );
        }
    }

    fn transition(&self, inner: &mut MachineState, to: SystemState, cause: TransitionCause) {
        let from = inner.state;
        match to {
            SystemState::Halted => error!(%from, %to, cause = ?cause, "System halted"),
            SystemState::Degraded => warn!(%from, %to, cause = ?cause, "System degraded"),
            SystemState::Active => info!(%from, %to, cause = ?cause, "System active"),
        }

        inner.state = to;
        inner.history.push(TransitionEvent {
            from,
            to,
            cause,
            at: Utc::now(),
        });
        self.state_tx.send_replace(to);
    }

    fn write_incident(&self, incident: IncidentRecord) {
        if let Err(err) = self.incidents.record(&incident) {
            error!(
                error = %err,
                kind = ?incident.kind,
                "Failed to write incident record"
            );
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MachineState>, DegradationError> {
        self.inner.lock().map_err(|_| DegradationError::LockPoisoned)
    }
}
