//! Remote plan store boundary.
//!
//! The release contract is an external collaborator. This module defines
//! the [`PlanStore`] trait that the rest of the crate drives, the value
//! types that cross it, and [`CastPlanStore`], which talks to a deployed
//! contract through Foundry's `cast` CLI.
//!
//! ```text
//! lookup_plan(account, index)    -> PlanRecord | StoreError
//! plan_count(account)            -> Option<u64>   (None: probe instead)
//! claimable_amount(account)      -> TokenAmount
//! submit_claim(signer, request)  -> PendingHandle
//! await_confirmation(handle)     -> () | StoreError
//! ```

pub mod cast;
pub mod trait_def;
pub mod types;

pub use cast::{CastConfig, CastPlanStore};
pub use trait_def::PlanStore;
pub use types::{ClaimRequest, PendingHandle, StoreError};
