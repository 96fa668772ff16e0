//! Wallet boundary: supplies accounts and the signing capability used to
//! authorize claim transactions.
//!
//! Account switches are not reported through callbacks. The wallet layer
//! pushes [`WalletEvent`]s into a channel that the session coordinator
//! consumes in order.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::Address;

/// Account-change notification from the wallet layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The wallet's account list changed. The first entry is the active
    /// account; an empty list means the wallet disconnected.
    AccountsChanged(Vec<Address>),
}

/// How a claim transaction is signed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SigningMethod {
    /// The RPC node holds the key (e.g. a local dev node).
    #[default]
    Unlocked,
    /// Raw private key read from the named environment variable.
    PrivateKeyEnv { var: String },
    /// Encrypted keystore file.
    Keystore {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password_file: Option<PathBuf>,
    },
}

/// Authorization to send transactions from one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    pub account: Address,
    pub method: SigningMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("account {0} is not managed by this wallet")]
    UnknownAccount(Address),

    #[error("signing credential unavailable: {0}")]
    Credential(String),
}

/// Source of accounts and signers.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Ask the wallet for its accounts. The first one is active.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Produce a signer for `account`.
    async fn signer(&self, account: &Address) -> Result<Signer, WalletError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Wallet) {}
};

/// A wallet backed by a fixed list of accounts from configuration.
#[derive(Debug, Clone)]
pub struct StaticWallet {
    accounts: Vec<Address>,
    method: SigningMethod,
}

impl StaticWallet {
    pub fn new(accounts: Vec<Address>, method: SigningMethod) -> Self {
        Self { accounts, method }
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }
}

#[async_trait]
impl Wallet for StaticWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        if self.accounts.is_empty() {
            return Err(WalletError::Unavailable(
                "no accounts configured".to_string(),
            ));
        }
        Ok(self.accounts.clone())
    }

    async fn signer(&self, account: &Address) -> Result<Signer, WalletError> {
        if !self.accounts.contains(account) {
            return Err(WalletError::UnknownAccount(*account));
        }
        if let SigningMethod::PrivateKeyEnv { var } = &self.method {
            if std::env::var(var).is_err() {
                return Err(WalletError::Credential(format!(
                    "environment variable {var} is not set"
                )));
            }
        }
        Ok(Signer {
            account: *account,
            method: self.method.clone(),
        })
    }
}
