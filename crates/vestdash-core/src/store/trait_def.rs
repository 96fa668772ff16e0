//! The `PlanStore` trait -- the adapter interface for the release contract.

use async_trait::async_trait;

use super::types::{ClaimRequest, PendingHandle, StoreError};
use crate::model::{Address, PlanRecord, TokenAmount};
use crate::wallet::Signer;

/// Read and mutate release plans held by a remote store.
///
/// Every method is a suspension point. The trait is object-safe so the
/// reconciler and claim orchestrator can share an `Arc<dyn PlanStore>`.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Short name used in logs (e.g. "cast").
    fn name(&self) -> &str;

    /// Point read of the plan at `index` for `account`.
    ///
    /// Fails both when the index does not exist and when the store cannot
    /// be reached.
    async fn lookup_plan(&self, account: &Address, index: u64) -> Result<PlanRecord, StoreError>;

    /// Number of plans for `account`, if the store can report it.
    ///
    /// Stores without a count query return `Ok(None)` and discovery falls
    /// back to probing indices until a lookup fails.
    async fn plan_count(&self, _account: &Address) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    /// Aggregate amount `account` may withdraw right now.
    async fn claimable_amount(&self, account: &Address) -> Result<TokenAmount, StoreError>;

    /// Submit a claim transaction signed by `signer`.
    ///
    /// Returns as soon as the store accepts the request. Submission is not
    /// success; callers must wait on the returned handle.
    async fn submit_claim(
        &self,
        signer: &Signer,
        request: ClaimRequest,
    ) -> Result<PendingHandle, StoreError>;

    /// Wait until the transaction behind `handle` is confirmed.
    async fn await_confirmation(&self, handle: &PendingHandle) -> Result<(), StoreError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};
