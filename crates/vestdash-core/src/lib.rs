//! Release-plan reconciliation and claim orchestration.
//!
//! The crate never implements the release contract's accounting. It
//! observes the contract through a [`store::PlanStore`], republishes an
//! atomic [`model::SessionView`] after every state-changing event, and
//! sequences claim transactions against it.
//!
//! ```text
//! WalletEvent / SessionCommand
//!     |
//!     v
//! Session --claim--> ClaimOrchestrator --submit/confirm--> PlanStore
//!     |                      |
//!     |                      v (confirmed)
//!     +--reconcile-----> Reconciler --discover + claimable--> PlanStore
//!                            |
//!                            v
//!                  watch<Arc<SessionView>>
//! ```

pub mod claim;
pub mod discovery;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod wallet;
