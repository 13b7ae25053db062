//! Durable JSON-lines ledger.
//!
//! One sealed entry per line. `append` writes the line and calls `sync_data`
//! before the entry becomes visible to readers, so an acknowledged entry is
//! always on disk. A torn final line left by a crash is trimmed on open; it
//! was never acknowledged. If a failed write cannot be trimmed at runtime the
//! ledger refuses every later append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use decision_types::LedgerEntry;
use tracing::{debug, error, info, warn};

use crate::arena::{check_extends, EntryArena};
use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerWriter};

/// Write side of the ledger file.
trait SegmentFile: Send {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl SegmentFile for File {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        Write::write_all(self, line)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct WriterState {
    file: Box<dyn SegmentFile>,
    committed_len: u64,
    /// Set when a partial line could not be trimmed; the file tail is unknown.
    poisoned: Option<String>,
}

/// File-backed ledger with durability-before-acknowledge.
pub struct FileLedger {
    path: PathBuf,
    arena: EntryArena,
    writer: Mutex<WriterState>,
}

impl FileLedger {
    /// Open (or create) the ledger file and load every committed entry.
    ///
    /// Loading does not verify the chain; run [`LedgerReader::verify`] for that.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let (entries, committed_len) = parse_lines(&raw)?;

        if committed_len < raw.len() as u64 {
            warn!(
                path = %path.display(),
                discarded_bytes = raw.len() as u64 - committed_len,
                "Trimming torn final ledger line"
            );
            file.set_len(committed_len)?;
            file.sync_data()?;
        }

        info!(
            path = %path.display(),
            entries = entries.len(),
            "Opened file ledger"
        );

        Ok(Self {
            path,
            arena: EntryArena::from_entries(entries),
            writer: Mutex::new(WriterState {
                file: Box::new(file),
                committed_len,
                poisoned: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_lines(raw: &[u8]) -> Result<(Vec<LedgerEntry>, u64), LedgerError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < raw.len() {
        let Some(newline) = raw[offset..].iter().position(|b| *b == b'\n') else {
            // Unterminated tail: a write that never completed.
            break;
        };
        let line = &raw[offset..offset + newline];
        if !line.iter().all(u8::is_ascii_whitespace) {
            let entry: LedgerEntry = serde_json::from_slice(line).map_err(|error| {
                LedgerError::Serialization(format!(
                    "ledger line {} is not a valid entry: {error}",
                    entries.len() + 1
                ))
            })?;
            entries.push(entry);
        }
        offset += newline + 1;
    }

    Ok((entries, offset as u64))
}

impl LedgerWriter for FileLedger {
    fn append(&self, entry: LedgerEntry) -> Result<u64, LedgerError> {
        let mut writer = self.writer.lock().map_err(|_| LedgerError::LockPoisoned)?;
        if let Some(reason) = &writer.poisoned {
            return Err(LedgerError::IntegrityViolation {
                seq: entry.seq(),
                reason: reason.clone(),
            });
        }

        let tail = self.arena.tail()?;
        check_extends(tail.as_deref(), &entry)?;

        let mut line = serde_json::to_vec(&entry)
            .map_err(|error| LedgerError::Serialization(error.to_string()))?;
        line.push(b'\n');

        let write_result = writer
            .file
            .write_line(&line)
            .and_then(|_| writer.file.sync());

        if let Err(error) = write_result {
            // Drop any partial line so the next append starts on a clean boundary.
            let committed_len = writer.committed_len;
            if let Err(trim_error) = writer.file.truncate_to(committed_len) {
                let reason = format!(
                    "partial write at byte {committed_len} could not be trimmed: {trim_error}"
                );
                error!(seq = entry.seq(), error = %error, reason = %reason, "Ledger file poisoned");
                writer.poisoned = Some(reason.clone());
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq(),
                    reason,
                });
            }
            return Err(error.into());
        }

        writer.committed_len += line.len() as u64;
        let seq = entry.seq();
        self.arena.push(entry)?;

        debug!(seq, path = %self.path.display(), "Entry persisted");
        Ok(seq)
    }
}

impl LedgerReader for FileLedger {
    fn tail(&self) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        self.arena.tail()
    }

    fn read_range(
        &self,
        from_seq: u64,
        to_seq: u64,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        self.arena.range(from_seq, to_seq)
    }

    fn entry_count(&self) -> Result<u64, LedgerError> {
        self.arena.len()
    }
}
