use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use decision_degradation::{
    DegradationConfig, DegradationMachine, HaltCause, MemoryIncidentLog, TransitionEvent,
};
use decision_ledger::{
    CheckpointSigner, LedgerStore, SignedCheckpoint, VerificationReport, VerifyingKey,
};
use decision_types::{
    Authority, AuthorityToken, ConstraintSet, LedgerEntry, Payload, SubmitOutcome, SystemState,
};
use decision_witness::{WitnessProjection, WitnessSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::appender::{AppendRequest, Appender, CancelOnDrop, Ticket};
use crate::checkpoints::CheckpointBook;
use crate::config::EngineConfig;
use crate::error::{EngineError, SubmitError};
use crate::submission::{CommitReceipt, SubmissionRequest, SubmissionResponse};
use crate::traits::{AuthorityValidator, PayloadValidator};
use crate::validators::AcceptAnyPayload;

/// State shared between the submit path and the appender task.
pub(crate) struct EngineCore {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) machine: Arc<DegradationMachine>,
    pub(crate) witness: Arc<WitnessProjection>,
    pub(crate) checkpoints: Arc<CheckpointBook>,
    state_publish: Mutex<()>,
}

impl EngineCore {
    /// Report a rejection to the degradation machine and hand the error back.
    pub(crate) fn reject(&self, error: SubmitError) -> SubmitError {
        if error.kind().is_fatal() {
            self.halt(HaltCause::SequenceConflict {
                detail: error.to_string(),
            });
        } else {
            self.notify(SubmitOutcome::Rejected(error.kind()));
        }
        error
    }

    fn notify(&self, outcome: SubmitOutcome) {
        if let Err(err) = self.machine.record(outcome) {
            error!(error = %err, ?outcome, "Failed to record submit outcome");
        }
        self.publish_state();
    }

    pub(crate) fn notify_commit(&self, outcome: SubmitOutcome, write_latency: Duration) {
        if let Err(err) = self.machine.record_commit(outcome, write_latency) {
            error!(error = %err, ?outcome, "Failed to record commit outcome");
        }
        self.publish_state();
    }

    /// How long a ledger write may run before it is reported as slow. One
    /// millisecond past the configured threshold, since only writes strictly
    /// over it count.
    pub(crate) fn slow_write_after(&self) -> Option<Duration> {
        self.machine
            .config()
            .slow_write_threshold_ms
            .map(|ms| Duration::from_millis(ms.saturating_add(1)))
    }

    pub(crate) fn halt(&self, cause: HaltCause) {
        if let Err(err) = self.machine.halt(cause) {
            error!(error = %err, "Failed to halt degradation machine");
        }
        self.publish_state();
    }

    pub(crate) fn observe_commit(&self, entry: &LedgerEntry) {
        if let Err(err) = self.witness.observe_commit(entry) {
            error!(error = %err, seq = entry.seq(), "Failed to refresh witness");
        }
    }

    pub(crate) fn schedule_checkpoint(&self, seq: u64) {
        let store = Arc::clone(&self.store);
        let checkpoints = Arc::clone(&self.checkpoints);
        tokio::task::spawn_blocking(move || checkpoints.on_commit(seq, store.as_ref()));
    }

    /// Copy the machine's current state into the witness. The state is read
    /// under the publish lock so the last writer always carries the newest
    /// state.
    fn publish_state(&self) {
        let Ok(_guard) = self.state_publish.lock() else {
            error!("Witness state publish lock poisoned");
            return;
        };
        if let Err(err) = self.witness.observe_state(self.machine.state()) {
            error!(error = %err, "Failed to publish state to witness");
        }
    }
}

/// Builder for [`DecisionEngine`].
pub struct EngineBuilder {
    store: Arc<dyn LedgerStore>,
    authority: Arc<dyn AuthorityValidator>,
    payload_validator: Arc<dyn PayloadValidator>,
    machine: Option<Arc<DegradationMachine>>,
    signer: Option<CheckpointSigner>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn payload_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.payload_validator = validator;
        self
    }

    pub fn degradation(mut self, machine: Arc<DegradationMachine>) -> Self {
        self.machine = Some(machine);
        self
    }

    pub fn checkpoint_signer(mut self, signer: CheckpointSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify the existing chain, build the witness from the ledger tail, and
    /// spawn the appender. Must run inside a tokio runtime.
    pub fn start(self) -> Result<DecisionEngine, EngineError> {
        let machine = match self.machine {
            Some(machine) => machine,
            None => Arc::new(DegradationMachine::new(
                DegradationConfig::default(),
                Arc::new(MemoryIncidentLog::new()),
            )?),
        };

        let verification = self.store.verify()?;
        if !verification.valid {
            let detail = verification
                .failure
                .map(|f| format!("seq {}: {}", f.seq, f.reason))
                .unwrap_or_else(|| "chain verification failed".into());
            error!(detail = %detail, "Ledger failed verification at startup");
            machine.halt(HaltCause::IntegrityFailure { detail })?;
        }

        let witness = Arc::new(WitnessProjection::from_ledger(
            self.store.as_ref(),
            self.config.acknowledgment_window,
            machine.state(),
        )?);
        let signer = self
            .signer
            .unwrap_or_else(|| CheckpointSigner::ephemeral("ephemeral"));
        let checkpoints = Arc::new(CheckpointBook::new(signer, self.config.checkpoint_cadence));

        let core = Arc::new(EngineCore {
            store: self.store,
            machine,
            witness,
            checkpoints,
            state_publish: Mutex::new(()),
        });

        let (queue, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        tokio::spawn(Appender::new(Arc::clone(&core)).run(rx));

        info!(
            entries = verification.entry_count,
            state = %core.machine.state(),
            submit_timeout_ms = self.config.submit_timeout.as_millis() as u64,
            "Decision engine started"
        );

        Ok(DecisionEngine {
            core,
            authority: self.authority,
            payload_validator: self.payload_validator,
            queue,
            config: self.config,
        })
    }
}

/// Validates decision requests and commits accepted ones through the single
/// sequential appender.
///
/// Validation order: system not halted, authority, constraint declaration
/// (an empty set becomes the synthesized absence constraint and the entry is
/// flagged degraded-origin), payload. Every submit reports exactly one outcome
/// to the degradation machine.
pub struct DecisionEngine {
    core: Arc<EngineCore>,
    authority: Arc<dyn AuthorityValidator>,
    payload_validator: Arc<dyn PayloadValidator>,
    queue: mpsc::Sender<AppendRequest>,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn builder(
        store: Arc<dyn LedgerStore>,
        authority: Arc<dyn AuthorityValidator>,
    ) -> EngineBuilder {
        EngineBuilder {
            store,
            authority,
            payload_validator: Arc::new(AcceptAnyPayload),
            machine: None,
            signer: None,
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit one decision.
    ///
    /// The per-submit timeout covers validation and queueing. A request the
    /// appender has already claimed always runs to completion and its real
    /// outcome is returned; dropping this future before that point cancels it.
    #[instrument(
        name = "submit",
        skip_all,
        fields(payload_bytes = payload.len(), constraints = constraints.len())
    )]
    pub async fn submit(
        &self,
        payload: Payload,
        constraints: ConstraintSet,
        token: AuthorityToken,
    ) -> Result<CommitReceipt, SubmitError> {
        let deadline = Instant::now() + self.config.submit_timeout;
        let result = self.submit_until(deadline, payload, constraints, token).await;
        match &result {
            Ok(receipt) => debug!(
                seq = receipt.sequence_number,
                degraded_origin = receipt.degraded_origin,
                "Decision committed"
            ),
            Err(error) => info!(reason = error.kind().code(), "Decision rejected"),
        }
        result
    }

    /// Transport-level submission: raw payload, `key -> value` constraints,
    /// and token text in, `{status, sequence_number?, reason?}` out.
    pub async fn submit_request(&self, request: SubmissionRequest) -> SubmissionResponse {
        let token = AuthorityToken::new(request.authority_token);
        let result = match ConstraintSet::declare(request.constraints, Utc::now()) {
            Ok(constraints) => {
                self.submit(request.payload, constraints, token)
                    .await
            }
            Err(error) => self.reject_malformed(&token, error.to_string()).await,
        };
        result.into()
    }

    async fn submit_until(
        &self,
        deadline: Instant,
        payload: Payload,
        constraints: ConstraintSet,
        token: AuthorityToken,
    ) -> Result<CommitReceipt, SubmitError> {
        let core = &self.core;
        let authority = self.authorize(deadline, &token).await?;

        let (constraints, degraded_origin) = if constraints.is_empty() {
            warn!("No constraints declared; recording absence as a constraint");
            (ConstraintSet::absence(Utc::now()), true)
        } else {
            (constraints, false)
        };

        self.check_payload(&payload)?;

        let ticket = Ticket::new();
        let _cancel_on_drop = CancelOnDrop(ticket.clone());
        let (reply_tx, mut reply_rx) = oneshot::channel();
        let request = AppendRequest {
            ticket: ticket.clone(),
            payload,
            constraints,
            authority,
            degraded_origin,
            reply: reply_tx,
        };

        match timeout_at(deadline, self.queue.send(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(core.reject(SubmitError::LedgerUnavailable(
                    "appender is not running".into(),
                )))
            }
            Err(_) => return Err(core.reject(SubmitError::DecisionTimedOut)),
        }

        match timeout_at(deadline, &mut reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(core.reject(SubmitError::LedgerUnavailable(
                "appender dropped the request".into(),
            ))),
            Err(_) if ticket.cancel() => Err(core.reject(SubmitError::DecisionTimedOut)),
            Err(_) => {
                debug!("Submit deadline passed after claim; awaiting commit");
                match timeout_at(deadline + self.config.claimed_grace, &mut reply_rx).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(core.reject(SubmitError::LedgerUnavailable(
                        "appender dropped the request".into(),
                    ))),
                    Err(_) => {
                        // The appender still owns the write and will finish it.
                        warn!("Claimed write outlived the commit grace; reporting timeout");
                        Err(core.reject(SubmitError::DecisionTimedOut))
                    }
                }
            }
        }
    }

    async fn authorize(
        &self,
        deadline: Instant,
        token: &AuthorityToken,
    ) -> Result<Authority, SubmitError> {
        let core = &self.core;
        if core.machine.state().is_halted() {
            return Err(core.reject(SubmitError::SystemHalted));
        }
        if token.is_blank() {
            return Err(core.reject(SubmitError::AuthorityRejected));
        }
        match timeout_at(deadline, self.authority.validate(token)).await {
            Ok(true) => {}
            Ok(false) => return Err(core.reject(SubmitError::AuthorityRejected)),
            Err(_) => return Err(core.reject(SubmitError::DecisionTimedOut)),
        }
        Authority::attest(token).map_err(|_| core.reject(SubmitError::AuthorityRejected))
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), SubmitError> {
        if payload.len() > self.config.max_payload_bytes {
            return Err(self.core.reject(SubmitError::PayloadInvalid(format!(
                "payload is {} bytes; limit is {}",
                payload.len(),
                self.config.max_payload_bytes
            ))));
        }
        self.payload_validator
            .validate(payload)
            .map_err(|reason| self.core.reject(SubmitError::PayloadInvalid(reason)))
    }

    /// A request whose constraint mapping could not be parsed still passes the
    /// halt and authority checks first.
    async fn reject_malformed(
        &self,
        token: &AuthorityToken,
        reason: String,
    ) -> Result<CommitReceipt, SubmitError> {
        let deadline = Instant::now() + self.config.submit_timeout;
        self.authorize(deadline, token).await?;
        Err(self.core.reject(SubmitError::PayloadInvalid(reason)))
    }

    pub fn state(&self) -> SystemState {
        self.core.machine.state()
    }

    pub fn witness_snapshot(&self) -> Result<WitnessSnapshot, EngineError> {
        Ok(self.core.witness.snapshot()?)
    }

    pub fn read_range(&self, from_seq: u64, to_seq: u64) -> Result<Vec<Arc<LedgerEntry>>, EngineError> {
        Ok(self.core.store.read_range(from_seq, to_seq)?)
    }

    pub fn transitions(&self) -> Result<Vec<TransitionEvent>, EngineError> {
        Ok(self.core.machine.history()?)
    }

    /// Operator halt.
    pub fn halt(&self, operator: &str, reason: &str) -> Result<SystemState, EngineError> {
        let state = self.core.machine.halt(HaltCause::Operator {
            operator: operator.to_string(),
            reason: reason.to_string(),
        })?;
        self.core.publish_state();
        Ok(state)
    }

    /// Operator reset out of `Halted`.
    pub fn reset(&self, operator: &str) -> Result<SystemState, EngineError> {
        let state = self.core.machine.reset(operator)?;
        self.core.publish_state();
        Ok(state)
    }

    /// Recompute the chain and check the latest signed checkpoint. A broken
    /// chain or a checkpoint the ledger no longer matches halts the system.
    pub fn verify_integrity(&self) -> Result<VerificationReport, EngineError> {
        let report = self.core.checkpoints.report(self.core.store.as_ref())?;

        let checkpoint_mismatch = report
            .checkpoint
            .as_ref()
            .is_some_and(|c| !c.matches_ledger);
        if !report.chain.valid || checkpoint_mismatch {
            let detail = match &report.chain.failure {
                Some(failure) => format!("seq {}: {}", failure.seq, failure.reason),
                None => "ledger no longer matches signed checkpoint".to_string(),
            };
            self.core.halt(HaltCause::IntegrityFailure { detail });
        }
        Ok(report)
    }

    /// Sign a checkpoint of the current tail.
    pub fn checkpoint_now(&self) -> Result<Option<SignedCheckpoint>, EngineError> {
        self.core.checkpoints.checkpoint_now(self.core.store.as_ref())
    }

    pub fn latest_checkpoint(&self) -> Result<Option<SignedCheckpoint>, EngineError> {
        self.core.checkpoints.latest()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.core.checkpoints.verifying_key()
    }

    pub fn checkpoint_key_id(&self) -> &str {
        self.core.checkpoints.key_id()
    }
}
