//! Claim operation state machine.

use std::fmt;

use uuid::Uuid;

use crate::model::Address;
use crate::store::{ClaimRequest, PendingHandle};

/// Phase of one claim operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimStatus {
    Idle,
    Submitted,
    Confirmed,
    Failed,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid claim transition: {from} -> {to} for operation {operation}")]
pub struct ClaimTransitionError {
    pub operation: Uuid,
    pub from: ClaimStatus,
    pub to: ClaimStatus,
}

/// The claim state machine.
///
/// ```text
/// idle      -> submitted
/// idle      -> failed     (submission rejected)
/// submitted -> confirmed
/// submitted -> failed     (reverted, unreachable, timed out)
/// ```
pub struct ClaimStateMachine;

impl ClaimStateMachine {
    pub fn is_valid_transition(from: ClaimStatus, to: ClaimStatus) -> bool {
        matches!(
            (from, to),
            (ClaimStatus::Idle, ClaimStatus::Submitted)
                | (ClaimStatus::Idle, ClaimStatus::Failed)
                | (ClaimStatus::Submitted, ClaimStatus::Confirmed)
                | (ClaimStatus::Submitted, ClaimStatus::Failed)
        )
    }
}

/// One claim attempt, tracked from request to outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOperation {
    pub id: Uuid,
    pub account: Address,
    pub request: ClaimRequest,
    status: ClaimStatus,
    handle: Option<PendingHandle>,
}

impl ClaimOperation {
    pub fn new(account: Address, request: ClaimRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            request,
            status: ClaimStatus::Idle,
            handle: None,
        }
    }

    pub fn status(&self) -> ClaimStatus {
        self.status
    }

    pub fn handle(&self) -> Option<&PendingHandle> {
        self.handle.as_ref()
    }

    pub fn submitted(&mut self, handle: PendingHandle) -> Result<(), ClaimTransitionError> {
        self.transition(ClaimStatus::Submitted)?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn confirmed(&mut self) -> Result<(), ClaimTransitionError> {
        self.transition(ClaimStatus::Confirmed)
    }

    pub fn failed(&mut self) -> Result<(), ClaimTransitionError> {
        self.transition(ClaimStatus::Failed)
    }

    fn transition(&mut self, to: ClaimStatus) -> Result<(), ClaimTransitionError> {
        if !ClaimStateMachine::is_valid_transition(self.status, to) {
            return Err(ClaimTransitionError {
                operation: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
