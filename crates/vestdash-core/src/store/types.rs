use std::fmt;

use serde::{Deserialize, Serialize};

/// A mutating claim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum ClaimRequest {
    /// Claim the plan at this index.
    Index(u64),
    /// Claim every eligible plan of the signing account.
    All,
}

impl ClaimRequest {
    pub fn progress_message(&self) -> &'static str {
        match self {
            Self::Index(_) => "Claiming tokens...",
            Self::All => "Claiming all tokens...",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Index(_) => "Successfully claimed tokens",
            Self::All => "Successfully claimed all tokens",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Index(_) => "Failed to claim tokens",
            Self::All => "Failed to claim all tokens",
        }
    }
}

impl fmt::Display for ClaimRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "claim-index({index})"),
            Self::All => f.write_str("claim-all"),
        }
    }
}

/// Opaque reference to a submitted, not yet confirmed, claim transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingHandle(String);

impl PendingHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failures reported by a [`super::PlanStore`].
///
/// A failed lookup cannot tell "no such plan" apart from "store
/// unreachable"; discovery treats every lookup failure the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("plan store unreachable: {0}")]
    Unreachable(String),

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("transaction {0} failed on chain")]
    TransactionFailed(PendingHandle),
}
