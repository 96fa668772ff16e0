//! Wiring from resolved configuration to a running [`Session`].

use std::sync::Arc;

use tracing::debug;

use vestdash_core::model::Address;
use vestdash_core::session::{NoticeReceiver, Session};
use vestdash_core::store::{CastPlanStore, PlanStore};
use vestdash_core::wallet::StaticWallet;

use crate::config::{DisplaySection, VestdashConfig};

/// Everything a command needs to drive one session.
pub struct AppContext {
    pub session: Arc<Session>,
    pub notices: NoticeReceiver,
    pub accounts: Vec<Address>,
    pub display: DisplaySection,
}

impl AppContext {
    /// Build a session against the configured contract through `cast`.
    pub fn from_config(config: &VestdashConfig) -> Self {
        debug!(
            rpc_url = %config.cast.rpc_url,
            contract = %config.cast.contract,
            accounts = config.accounts.len(),
            "building session"
        );
        let store = Arc::new(CastPlanStore::new(config.cast.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: &VestdashConfig, store: Arc<dyn PlanStore>) -> Self {
        let wallet = Arc::new(StaticWallet::new(
            config.accounts.clone(),
            config.signer.clone(),
        ));
        let (session, notices) = Session::new(wallet, store, config.session.clone());
        Self {
            session: Arc::new(session),
            notices,
            accounts: config.accounts.clone(),
            display: config.display.clone(),
        }
    }
}
