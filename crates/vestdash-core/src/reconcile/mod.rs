//! Reconciliation engine: the single writer of the session view.
//!
//! Each reconciliation re-fetches everything for one account (plan
//! discovery and the aggregate claimable amount, issued concurrently) and
//! publishes one new [`SessionView`] only if both reads succeed. Nothing is
//! merged field by field.
//!
//! Reconciliations can overlap (rapid account switching, a claim finishing
//! while a refresh is in flight). Every reconciliation takes a generation
//! number when it is *initiated*, and its result is committed only if no
//! later one has been initiated since. A slow, older fetch that resolves
//! last is therefore discarded instead of overwriting newer state.
//!
//! The reconciler also remembers which account the latest initiation was
//! for (`None` after a clear). Follow-up reloads such as the one after a
//! confirmed claim go through [`Reconciler::reconcile_if_current`] and are
//! skipped once the session has moved to another account or disconnected.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoveryError, ProbePolicy, discover_plans};
use crate::model::{Address, SessionView};
use crate::store::{PlanStore, StoreError};

/// What happened to a reconciliation that finished without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The new view was published.
    Committed(Arc<SessionView>),
    /// A later reconciliation was initiated first; this result was dropped.
    Superseded { generation: u64, latest: u64 },
    /// `account` was no longer the latest target; nothing was fetched.
    Stale {
        account: Address,
        current: Option<Address>,
    },
}

impl ReconcileOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("claimable amount query failed for {account}: {source}")]
    Claimable {
        account: Address,
        #[source]
        source: StoreError,
    },
}

/// Generation and target of the most recent reconciliation or clear.
#[derive(Debug, Clone, Copy, Default)]
struct Latest {
    generation: u64,
    account: Option<Address>,
}

/// Owns the published [`SessionView`].
///
/// Readers subscribe through [`Reconciler::subscribe`] and only ever see
/// complete, immutable snapshots.
pub struct Reconciler {
    store: Arc<dyn PlanStore>,
    policy: ProbePolicy,
    latest: Mutex<Latest>,
    view: watch::Sender<Arc<SessionView>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store.name())
            .field("policy", &self.policy)
            .field("latest", &*self.latest())
            .finish()
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn PlanStore>, policy: ProbePolicy) -> Self {
        let (view, _) = watch::channel(Arc::new(SessionView::empty()));
        Self {
            store,
            policy,
            latest: Mutex::new(Latest::default()),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionView>> {
        self.view.subscribe()
    }

    /// The currently published view.
    pub fn current(&self) -> Arc<SessionView> {
        Arc::clone(&self.view.borrow())
    }

    /// Generation of the most recently initiated reconciliation.
    pub fn latest_generation(&self) -> u64 {
        self.latest().generation
    }

    /// Account the most recent reconciliation was initiated for, `None`
    /// if nothing was initiated yet or the last initiation was a clear.
    pub fn latest_account(&self) -> Option<Address> {
        self.latest().account
    }

    fn latest(&self) -> MutexGuard<'_, Latest> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, account: Option<Address>) -> u64 {
        let mut latest = self.latest();
        latest.generation += 1;
        latest.account = account;
        latest.generation
    }

    /// Re-fetch and republish the view for `account`.
    ///
    /// The generation is taken when this method is called, not when the
    /// returned future is first polled, so call order defines which
    /// reconciliation is "later".
    pub fn reconcile(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<ReconcileOutcome, ReconcileError>> + Send + '_ {
        let generation = self.begin(Some(account));
        self.fetch_and_commit(account, generation)
    }

    /// Re-fetch `account` only while it is still the latest target.
    ///
    /// The check and the new generation are taken together, so a switch or
    /// clear initiated before this call always wins over it.
    pub fn reconcile_if_current(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<ReconcileOutcome, ReconcileError>> + Send + '_ {
        let started = {
            let mut latest = self.latest();
            if latest.account == Some(account) {
                latest.generation += 1;
                Ok(latest.generation)
            } else {
                Err(latest.account)
            }
        };
        async move {
            match started {
                Ok(generation) => self.fetch_and_commit(account, generation).await,
                Err(current) => {
                    debug!(account = %account, current = ?current, "skipping reload for stale account");
                    Ok(ReconcileOutcome::Stale { account, current })
                }
            }
        }
    }

    async fn fetch_and_commit(
        &self,
        account: Address,
        generation: u64,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        debug!(account = %account, generation, "reconciling");

        let plans = async {
            discover_plans(self.store.as_ref(), &account, self.policy)
                .await
                .map_err(ReconcileError::from)
        };
        let claimable = async {
            self.store
                .claimable_amount(&account)
                .await
                .map_err(|source| ReconcileError::Claimable { account, source })
        };

        let (discovery, claimable_total) = match futures::try_join!(plans, claimable) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(account = %account, generation, error = %err, "reconciliation failed");
                return Err(err);
            }
        };

        let view = SessionView {
            account: Some(account),
            plans: discovery.plans,
            claimable_total,
            generation,
        };
        Ok(self.commit(view))
    }

    /// Publish the empty view and supersede anything in flight.
    pub fn clear(&self) -> ReconcileOutcome {
        let generation = self.begin(None);
        self.commit(SessionView {
            generation,
            ..SessionView::empty()
        })
    }

    fn commit(&self, view: SessionView) -> ReconcileOutcome {
        let generation = view.generation;
        let view = Arc::new(view);

        let committed = self.view.send_if_modified(|current| {
            if self.latest().generation != generation {
                return false;
            }
            *current = Arc::clone(&view);
            true
        });

        if committed {
            info!(
                account = ?view.account,
                generation,
                plans = view.plans.len(),
                claimable = %view.claimable_total,
                "session view published"
            );
            ReconcileOutcome::Committed(view)
        } else {
            let latest = self.latest_generation();
            debug!(generation, latest, "discarding superseded reconciliation");
            ReconcileOutcome::Superseded { generation, latest }
        }
    }
}
