//! Plan discovery: enumerate every release plan of an account.
//!
//! The release contract exposes plans only by index. Unless the store can
//! report a count, discovery probes indices 0, 1, 2, ... one at a time and
//! stops at the first lookup that fails. That failure is read as "no more
//! plans" even though it may have been a transient fault; the store gives
//! us no way to tell the two apart. [`ProbePolicy::terminal_retries`]
//! re-probes a failing index a bounded number of times before accepting it
//! as the end.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Address, PlanRecord, ReleasePlan};
use crate::store::{PlanStore, StoreError};

/// How to treat a failing lookup while probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbePolicy {
    /// Extra lookups of a failing index before it is treated as the end.
    /// `0` stops at the first failure.
    #[serde(default)]
    pub terminal_retries: u32,
}

/// Result of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Index-ascending and dense from 0.
    pub plans: Vec<ReleasePlan>,
    /// The lookup failure that ended probing, if probing was used.
    pub terminated_by: Option<StoreError>,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("plan count query failed for {account}: {source}")]
    Count {
        account: Address,
        #[source]
        source: StoreError,
    },

    #[error("lookup of plan {index} of {expected} failed for {account}: {source}")]
    Lookup {
        account: Address,
        index: u64,
        expected: u64,
        #[source]
        source: StoreError,
    },
}

/// Produce all plans for `account`, in index order.
///
/// Lookups are issued strictly in increasing index order and each one
/// finishes before the next starts. A failure at index 0 yields an empty
/// list, not an error. Errors are only possible when the store reports an
/// explicit count, since a missing index is then a real fault.
pub async fn discover_plans(
    store: &dyn PlanStore,
    account: &Address,
    policy: ProbePolicy,
) -> Result<Discovery, DiscoveryError> {
    let count = store
        .plan_count(account)
        .await
        .map_err(|source| DiscoveryError::Count {
            account: *account,
            source,
        })?;

    match count {
        Some(expected) => fetch_counted(store, account, expected).await,
        None => Ok(probe(store, account, policy).await),
    }
}

async fn probe(store: &dyn PlanStore, account: &Address, policy: ProbePolicy) -> Discovery {
    let mut plans = Vec::new();
    let mut index: u64 = 0;

    loop {
        match lookup_with_retries(store, account, index, policy.terminal_retries).await {
            Ok(record) => {
                plans.push(ReleasePlan::from_record(index, record));
                index += 1;
            }
            Err(err) => {
                debug!(
                    account = %account,
                    index,
                    found = plans.len(),
                    error = %err,
                    "plan probe ended"
                );
                return Discovery {
                    plans,
                    terminated_by: Some(err),
                };
            }
        }
    }
}

async fn lookup_with_retries(
    store: &dyn PlanStore,
    account: &Address,
    index: u64,
    retries: u32,
) -> Result<PlanRecord, StoreError> {
    let mut attempt: u32 = 0;
    loop {
        match store.lookup_plan(account, index).await {
            Ok(record) => return Ok(record),
            Err(err) if attempt < retries => {
                attempt += 1;
                debug!(
                    account = %account,
                    index,
                    attempt,
                    error = %err,
                    "plan lookup failed, probing again"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

async fn fetch_counted(
    store: &dyn PlanStore,
    account: &Address,
    expected: u64,
) -> Result<Discovery, DiscoveryError> {
    let mut plans = Vec::new();
    for index in 0..expected {
        let record = store.lookup_plan(account, index).await.map_err(|source| {
            warn!(account = %account, index, expected, "counted plan lookup failed");
            DiscoveryError::Lookup {
                account: *account,
                index,
                expected,
                source,
            }
        })?;
        plans.push(ReleasePlan::from_record(index, record));
    }
    Ok(Discovery {
        plans,
        terminated_by: None,
    })
}
