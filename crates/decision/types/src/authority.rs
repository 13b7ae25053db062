use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::EntryHash;

/// Opaque authority credential presented with a decision request.
///
/// The token text never appears in `Debug` output, logs, or the ledger; only
/// its subject and digest are recorded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorityToken(String);

impl AuthorityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Subject part of a `subject:credential` token; the whole token when no
    /// separator is present.
    pub fn subject(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(s, _)| s)
    }

    pub fn digest(&self) -> EntryHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"decision-ledger-authority-v1:");
        hasher.update(self.0.as_bytes());
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for AuthorityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthorityToken(<redacted>)")
    }
}

/// Who authorized a committed decision: an identifier plus a reference to the
/// proof of authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    id: String,
    proof_ref: EntryHash,
}

impl Authority {
    /// Derive the committed authority record from a token that has already
    /// passed validation.
    pub fn attest(token: &AuthorityToken) -> Result<Self, TypeError> {
        if token.is_blank() {
            return Err(TypeError::MissingAuthority);
        }
        Ok(Self {
            id: token.subject().to_string(),
            proof_ref: token.digest(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn proof_ref(&self) -> EntryHash {
        self.proof_ref
    }
}
