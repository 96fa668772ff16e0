//! Session coordinator: the presentation-facing operation surface.
//!
//! [`Session`] owns the reconciler and the claim orchestrator and exposes
//! `connect`, `accounts_changed`, `refresh`, `claim_one` and `claim_all`.
//! Every operation catches its own failure, turns it into a [`Notice`] on
//! the notice channel, and also returns the typed error to the caller. A
//! failure never ends the session and nothing is retried automatically.
//!
//! [`Session::run`] is the event-driven entry point: it consumes wallet
//! events and presentation commands from channels, in order, and drives
//! the resulting operations concurrently so a slow reconciliation never
//! blocks a later account switch.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::claim::{ClaimConfig, ClaimError, ClaimOrchestrator, ClaimOutcome};
use crate::discovery::ProbePolicy;
use crate::model::{Address, SessionView};
use crate::reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
use crate::store::{ClaimRequest, PlanStore};
use crate::wallet::{Wallet, WalletError, WalletEvent};

/// A user action routed through [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Connect,
    Refresh,
    ClaimOne(u64),
    ClaimAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Underlying error text, for logs and detail panes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            detail: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            detail: None,
        }
    }

    pub fn error(message: impl Into<String>, detail: impl ToString) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            detail: Some(detail.to_string()),
        }
    }
}

pub const LOAD_FAILED: &str = "Failed to load user data";
pub const CONNECT_FAILED: &str = "Failed to connect wallet";
pub const NO_WALLET: &str = "Please install a wallet";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("wallet returned no accounts")]
    NoAccounts,

    #[error("no account connected")]
    NotConnected,

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Claim(#[from] ClaimError),
}

/// Settings for building a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub probe: ProbePolicy,
    pub claims: ClaimConfig,
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub struct Session {
    wallet: Arc<dyn Wallet>,
    reconciler: Arc<Reconciler>,
    claims: ClaimOrchestrator,
    /// The wallet's active account. May run ahead of the published view
    /// while a reconciliation for it is still in flight.
    current: Mutex<Option<Address>>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current", &self.current_account())
            .field("reconciler", &self.reconciler)
            .field("claims", &self.claims)
            .finish()
    }
}

impl Session {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        store: Arc<dyn PlanStore>,
        config: SessionConfig,
    ) -> (Self, NoticeReceiver) {
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), config.probe));
        let claims = ClaimOrchestrator::new(store, Arc::clone(&reconciler), config.claims);
        let (notices, rx) = mpsc::unbounded_channel();
        let session = Self {
            wallet,
            reconciler,
            claims,
            current: Mutex::new(None),
            notices,
        };
        (session, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionView>> {
        self.reconciler.subscribe()
    }

    pub fn view(&self) -> Arc<SessionView> {
        self.reconciler.current()
    }

    pub fn current_account(&self) -> Option<Address> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_current(&self, account: Option<Address>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = account;
    }

    fn notify(&self, notice: Notice) {
        // A dropped receiver just means nobody is watching.
        let _ = self.notices.send(notice);
    }

    // -- Operations --

    /// Ask the wallet for accounts and load the first one.
    pub async fn connect(&self) -> Result<Address, SessionError> {
        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                let message = match &err {
                    WalletError::Unavailable(_) => NO_WALLET,
                    _ => CONNECT_FAILED,
                };
                self.notify(Notice::error(message, &err));
                return Err(err.into());
            }
        };

        let Some(account) = accounts.first().copied() else {
            self.notify(Notice::error(CONNECT_FAILED, SessionError::NoAccounts));
            return Err(SessionError::NoAccounts);
        };

        info!(account = %account, "wallet connected");
        self.set_current(Some(account));
        self.notify(Notice::info(format!("Connected {}", account.short())));
        self.reconcile_account(account).await?;
        Ok(account)
    }

    /// Apply a wallet account-list change.
    ///
    /// The new active account is recorded and its reconciliation initiated
    /// before this returns the future, so successive calls are ordered by
    /// call order even if their futures are polled out of order.
    pub fn accounts_changed(
        &self,
        accounts: Vec<Address>,
    ) -> impl Future<Output = Result<Option<Address>, SessionError>> + Send + '_ {
        let next = accounts.first().copied();
        self.set_current(next);

        let pending = match next {
            Some(account) => {
                info!(account = %account, "wallet switched account");
                Some((account, self.reconciler.reconcile(account)))
            }
            None => {
                info!("wallet disconnected");
                self.reconciler.clear();
                self.notify(Notice::info("Wallet disconnected"));
                None
            }
        };

        async move {
            match pending {
                Some((account, reconcile)) => {
                    self.report_reconcile(account, reconcile.await)?;
                    Ok(Some(account))
                }
                None => Ok(None),
            }
        }
    }

    /// Reconcile the current account again.
    pub async fn refresh(&self) -> Result<ReconcileOutcome, SessionError> {
        let Some(account) = self.current_account() else {
            self.notify(Notice::error(LOAD_FAILED, SessionError::NotConnected));
            return Err(SessionError::NotConnected);
        };
        self.reconcile_account(account).await
    }

    pub async fn claim_one(&self, index: u64) -> Result<ClaimOutcome, SessionError> {
        self.claim(ClaimRequest::Index(index)).await
    }

    pub async fn claim_all(&self) -> Result<ClaimOutcome, SessionError> {
        self.claim(ClaimRequest::All).await
    }

    async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, SessionError> {
        let Some(account) = self.current_account() else {
            self.notify(Notice::error(
                request.failure_message(),
                SessionError::NotConnected,
            ));
            return Err(SessionError::NotConnected);
        };

        let signer = match self.wallet.signer(&account).await {
            Ok(signer) => signer,
            Err(err) => {
                self.notify(Notice::error(request.failure_message(), &err));
                return Err(err.into());
            }
        };

        self.notify(Notice::info(request.progress_message()));
        let view = self.reconciler.current();

        match self.claims.claim(&view, request, &signer).await {
            Ok(outcome) => {
                self.notify(Notice::success(request.success_message()));
                if let Err(err) = &outcome.reconcile {
                    self.notify(Notice::error(LOAD_FAILED, err));
                }
                Ok(outcome)
            }
            Err(err) => {
                self.notify(Notice::error(request.failure_message(), &err));
                Err(err.into())
            }
        }
    }

    async fn reconcile_account(&self, account: Address) -> Result<ReconcileOutcome, SessionError> {
        let result = self.reconciler.reconcile(account).await;
        self.report_reconcile(account, result)
    }

    fn report_reconcile(
        &self,
        account: Address,
        result: Result<ReconcileOutcome, ReconcileError>,
    ) -> Result<ReconcileOutcome, SessionError> {
        match result {
            Ok(outcome) => {
                if let ReconcileOutcome::Superseded { generation, latest } = &outcome {
                    debug!(account = %account, generation, latest, "reconciliation superseded");
                }
                Ok(outcome)
            }
            Err(err) => {
                self.notify(Notice::error(LOAD_FAILED, &err));
                Err(err.into())
            }
        }
    }

    // -- Event loop --

    /// Consume wallet events and commands until cancelled or both
    /// channels close.
    ///
    /// Events and commands are taken off their channels in order. The
    /// operations they start run concurrently; results surface through
    /// the view and the notice channel.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<WalletEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
    ) {
        let mut in_flight: FuturesUnordered<BoxFuture<'_, ()>> = FuturesUnordered::new();
        let mut events_open = true;
        let mut commands_open = true;

        loop {
            if !events_open && !commands_open && in_flight.is_empty() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(in_flight = in_flight.len(), "session loop cancelled");
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(WalletEvent::AccountsChanged(accounts)) => {
                        in_flight.push(self.accounts_changed(accounts).map(|_| ()).boxed());
                    }
                    None => events_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => in_flight.push(self.dispatch(command)),
                    None => commands_open = false,
                },
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
                else => break,
            }
        }
    }

    fn dispatch(&self, command: SessionCommand) -> BoxFuture<'_, ()> {
        debug!(?command, "session command");
        match command {
            SessionCommand::Connect => self.connect().map(|_| ()).boxed(),
            SessionCommand::Refresh => self.refresh().map(|_| ()).boxed(),
            SessionCommand::ClaimOne(index) => self.claim_one(index).map(|_| ()).boxed(),
            SessionCommand::ClaimAll => self.claim_all().map(|_| ()).boxed(),
        }
    }
}
