use std::time::Duration;

/// Configuration for the decision engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard per-submit budget, from arrival until the request is claimed by
    /// the appender (default: 2s).
    pub submit_timeout: Duration,
    /// Extra wait, past `submit_timeout`, for a request the appender already
    /// claimed. The write still finishes after the caller gives up
    /// (default: 1s).
    pub claimed_grace: Duration,
    /// Bound on queued append requests (default: 1024).
    pub queue_capacity: usize,
    /// Largest accepted payload (default: 64 KiB).
    pub max_payload_bytes: usize,
    /// Trailing entries whose constraint keys the witness reports (default: 8).
    pub acknowledgment_window: usize,
    /// Entries between signed checkpoints; zero disables (default: 10).
    pub checkpoint_cadence: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(2),
            claimed_grace: Duration::from_secs(1),
            queue_capacity: 1024,
            max_payload_bytes: 64 * 1024,
            acknowledgment_window: 8,
            checkpoint_cadence: 10,
        }
    }
}
