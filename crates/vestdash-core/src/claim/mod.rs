//! Claim orchestration: submit, confirm, then reconcile.
//!
//! A claim is two remote steps. Submission yields a [`PendingHandle`];
//! only a successful confirmation of that handle counts as success and
//! triggers reconciliation of the claiming account, provided it is still
//! the session's account. Any failure leaves the published view exactly
//! as it was.

pub mod state;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{Address, SessionView};
use crate::reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
use crate::store::{ClaimRequest, PendingHandle, PlanStore, StoreError};
use crate::wallet::Signer;

pub use state::{ClaimOperation, ClaimStateMachine, ClaimStatus, ClaimTransitionError};

/// Default bound on the confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// `None` waits for confirmation indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Some(DEFAULT_CONFIRMATION_TIMEOUT),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("no account connected")]
    NotConnected,

    #[error("signer account {signer} does not match session account {session}")]
    AccountMismatch { signer: Address, session: Address },

    #[error("plan {index} is not in the current view")]
    UnknownPlan { index: u64 },

    #[error("a claim is already in flight for {account}")]
    InFlight { account: Address },

    #[error("claim submission rejected: {0}")]
    Submission(#[source] StoreError),

    #[error("claim {handle} was not confirmed: {source}")]
    Confirmation {
        handle: PendingHandle,
        #[source]
        source: StoreError,
    },

    #[error("claim {handle} was not confirmed within {timeout:?}")]
    Timeout {
        handle: PendingHandle,
        timeout: Duration,
    },

    #[error(transparent)]
    Transition(#[from] ClaimTransitionError),
}

/// A confirmed claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub operation_id: Uuid,
    pub account: Address,
    pub request: ClaimRequest,
    pub handle: PendingHandle,
}

/// A confirmed claim plus the reconciliation it triggered.
///
/// The claim itself succeeded even if `reconcile` is an error; the view
/// then still shows pre-claim state until the next successful refresh.
/// `reconcile` is [`ReconcileOutcome::Stale`] when the session moved to
/// another account before the claim confirmed.
#[derive(Debug)]
pub struct ClaimOutcome {
    pub receipt: ClaimReceipt,
    pub reconcile: Result<ReconcileOutcome, ReconcileError>,
}

pub struct ClaimOrchestrator {
    store: Arc<dyn PlanStore>,
    reconciler: Arc<Reconciler>,
    config: ClaimConfig,
    in_flight: Mutex<HashSet<Address>>,
}

impl std::fmt::Debug for ClaimOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimOrchestrator")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Removes the account from the in-flight set when dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<Address>>,
    account: Address,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.account);
    }
}

impl ClaimOrchestrator {
    pub fn new(store: Arc<dyn PlanStore>, reconciler: Arc<Reconciler>, config: ClaimConfig) -> Self {
        Self {
            store,
            reconciler,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a claim for `account` is currently between submission and outcome.
    pub fn is_in_flight(&self, account: &Address) -> bool {
        let set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.contains(account)
    }

    fn acquire(&self, account: Address) -> Result<InFlightGuard<'_>, ClaimError> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(account) {
            return Err(ClaimError::InFlight { account });
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            account,
        })
    }

    /// Run `request` against `view` and, once confirmed, reconcile.
    ///
    /// Only existence of the plan in `view` is checked up front; whether it
    /// is already claimed or not yet started is for the store to decide.
    pub async fn claim(
        &self,
        view: &SessionView,
        request: ClaimRequest,
        signer: &Signer,
    ) -> Result<ClaimOutcome, ClaimError> {
        let account = view.account.ok_or(ClaimError::NotConnected)?;
        if signer.account != account {
            return Err(ClaimError::AccountMismatch {
                signer: signer.account,
                session: account,
            });
        }
        if let ClaimRequest::Index(index) = request {
            if view.plan(index).is_none() {
                return Err(ClaimError::UnknownPlan { index });
            }
        }

        let guard = self.acquire(account)?;
        let receipt = self.submit_and_confirm(account, request, signer).await;
        drop(guard);
        let receipt = receipt?;

        // The session may have switched or disconnected while confirming.
        let reconcile = self.reconciler.reconcile_if_current(account).await;
        Ok(ClaimOutcome { receipt, reconcile })
    }

    async fn submit_and_confirm(
        &self,
        account: Address,
        request: ClaimRequest,
        signer: &Signer,
    ) -> Result<ClaimReceipt, ClaimError> {
        let mut op = ClaimOperation::new(account, request);
        info!(operation = %op.id, account = %account, request = %request, "submitting claim");

        let handle = match self.store.submit_claim(signer, request).await {
            Ok(handle) => handle,
            Err(err) => {
                op.failed()?;
                warn!(operation = %op.id, error = %err, "claim submission rejected");
                return Err(ClaimError::Submission(err));
            }
        };
        op.submitted(handle.clone())?;
        info!(operation = %op.id, tx = %handle, "claim submitted, awaiting confirmation");

        if let Err(err) = self.confirm(&handle).await {
            op.failed()?;
            warn!(operation = %op.id, tx = %handle, error = %err, "claim not confirmed");
            return Err(err);
        }
        op.confirmed()?;
        info!(operation = %op.id, tx = %handle, "claim confirmed");

        Ok(ClaimReceipt {
            operation_id: op.id,
            account,
            request,
            handle,
        })
    }

    async fn confirm(&self, handle: &PendingHandle) -> Result<(), ClaimError> {
        let wait = self.store.await_confirmation(handle);
        let result = match self.config.confirmation_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ClaimError::Timeout {
                        handle: handle.clone(),
                        timeout,
                    });
                }
            },
            None => wait.await,
        };
        result.map_err(|source| ClaimError::Confirmation {
            handle: handle.clone(),
            source,
        })
    }
}
