//! Out-of-band incident log.
//!
//! Fatal conditions and operator interventions are recorded here, outside the
//! decision ledger, so the ledger itself only ever holds decisions.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use decision_types::SystemState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IncidentLogError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    SequenceConflict,
    IntegrityFailure,
    OperatorHalt,
    OperatorReset,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: Uuid,
    pub kind: IncidentKind,
    pub state_before: SystemState,
    pub state_after: SystemState,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl IncidentRecord {
    pub fn new(
        kind: IncidentKind,
        state_before: SystemState,
        state_after: SystemState,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state_before,
            state_after,
            detail: detail.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only sink for incident records.
pub trait IncidentLog: Send + Sync {
    fn record(&self, incident: &IncidentRecord) -> Result<(), IncidentLogError>;

    fn records(&self) -> Result<Vec<IncidentRecord>, IncidentLogError>;
}

#[derive(Default)]
pub struct MemoryIncidentLog {
    records: Mutex<Vec<IncidentRecord>>,
}

impl MemoryIncidentLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IncidentLog for MemoryIncidentLog {
    fn record(&self, incident: &IncidentRecord) -> Result<(), IncidentLogError> {
        self.records
            .lock()
            .map_err(|_| IncidentLogError::LockPoisoned)?
            .push(incident.clone());
        Ok(())
    }

    fn records(&self) -> Result<Vec<IncidentRecord>, IncidentLogError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| IncidentLogError::LockPoisoned)?
            .clone())
    }
}

/// JSON-lines incident log, synced after every record.
pub struct FileIncidentLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileIncidentLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IncidentLogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IncidentLog for FileIncidentLog {
    fn record(&self, incident: &IncidentRecord) -> Result<(), IncidentLogError> {
        let mut line = serde_json::to_vec(incident)?;
        line.push(b'\n');
        let mut file = self.file.lock().map_err(|_| IncidentLogError::LockPoisoned)?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    fn records(&self) -> Result<Vec<IncidentRecord>, IncidentLogError> {
        let _guard = self.file.lock().map_err(|_| IncidentLogError::LockPoisoned)?;
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents/log.jsonl");

        let halt = IncidentRecord::new(
            IncidentKind::OperatorHalt,
            SystemState::Active,
            SystemState::Halted,
            "maintenance",
        );
        FileIncidentLog::open(&path).unwrap().record(&halt).unwrap();

        let log = FileIncidentLog::open(&path).unwrap();
        let reset = IncidentRecord::new(
            IncidentKind::OperatorReset,
            SystemState::Halted,
            SystemState::Degraded,
            "ops",
        );
        log.record(&reset).unwrap();

        let records = log.records().unwrap();
        assert_eq!(records, vec![halt, reset]);
    }

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryIncidentLog::new();
        for kind in [IncidentKind::SequenceConflict, IncidentKind::OperatorReset] {
            log.record(&IncidentRecord::new(
                kind,
                SystemState::Active,
                SystemState::Halted,
                "",
            ))
            .unwrap();
        }
        let kinds: Vec<_> = log.records().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![IncidentKind::SequenceConflict, IncidentKind::OperatorReset]
        );
    }
}
