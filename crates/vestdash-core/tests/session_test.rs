//! Integration tests for the session coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vestdash_core::model::{Address, TokenAmount};
use vestdash_core::reconcile::ReconcileOutcome;
use vestdash_core::session::{
    LOAD_FAILED, NO_WALLET, Notice, NoticeLevel, NoticeReceiver, Session, SessionCommand,
    SessionConfig, SessionError,
};
use vestdash_core::store::ClaimRequest;
use vestdash_core::wallet::WalletEvent;
use vestdash_test_utils::{MemoryPlanStore, addr, record, wallet};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn session(store: &Arc<MemoryPlanStore>, accounts: &[Address]) -> (Session, NoticeReceiver) {
    Session::new(
        Arc::new(wallet(accounts)),
        store.clone(),
        SessionConfig::default(),
    )
}

fn drain(rx: &mut NoticeReceiver) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

fn errors(notices: &[Notice]) -> Vec<&str> {
    notices
        .iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .map(|n| n.message.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Connect and account changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_loads_first_account() {
    let store = Arc::new(MemoryPlanStore::new());
    let (a, b) = (addr(0xa), addr(0xb));
    store.set_plans(a, vec![record(1, 10), record(2, 20)]);
    store.set_claimable(a, 10);
    let (session, mut notices) = session(&store, &[a, b]);

    let connected = session.connect().await.unwrap();

    assert_eq!(connected, a);
    assert_eq!(session.current_account(), Some(a));
    let view = session.view();
    assert_eq!(view.account, Some(a));
    assert_eq!(view.plans.len(), 2);
    assert_eq!(view.claimable_total, TokenAmount(10));
    assert!(errors(&drain(&mut notices)).is_empty());
}

#[tokio::test]
async fn connect_without_wallet_asks_for_one() {
    let store = Arc::new(MemoryPlanStore::new());
    let (session, mut notices) = session(&store, &[]);

    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, SessionError::Wallet(_)));
    assert_eq!(errors(&drain(&mut notices)), vec![NO_WALLET]);
    assert!(!session.view().is_connected());
}

#[tokio::test]
async fn account_with_zero_plans_is_not_an_error() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(3);
    let (session, mut notices) = session(&store, &[account]);

    session.connect().await.unwrap();

    let view = session.view();
    assert_eq!(view.account, Some(account));
    assert!(view.plans.is_empty());
    assert_eq!(view.claimable_total, TokenAmount::ZERO);
    assert_eq!(store.claimable_queries(), vec![account]);
    assert!(errors(&drain(&mut notices)).is_empty());
}

#[tokio::test]
async fn switch_mid_flight_ends_on_new_account() {
    let store = Arc::new(MemoryPlanStore::new());
    let (a, b) = (addr(0xa), addr(0xb));
    store.set_plans(a, vec![record(1, 1), record(2, 2), record(3, 3)]);
    store.set_plans(b, vec![record(4, 4)]);
    store.set_claimable(b, 4);
    let gate_a = store.gate_claimable(a);
    let (session, mut notices) = session(&store, &[a, b]);

    let to_a = session.accounts_changed(vec![a]);
    tokio::pin!(to_a);
    assert!(futures::poll!(&mut to_a).is_pending());

    let to_b = session.accounts_changed(vec![b]);
    assert_eq!(to_b.await.unwrap(), Some(b));

    gate_a.release();
    assert_eq!(to_a.await.unwrap(), Some(a));

    assert_eq!(session.current_account(), Some(b));
    let view = session.view();
    assert_eq!(view.account, Some(b));
    assert_eq!(view.plans.len(), 1);
    assert_eq!(view.claimable_total, TokenAmount(4));
    assert!(errors(&drain(&mut notices)).is_empty());
}

#[tokio::test]
async fn empty_account_list_disconnects() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 1)]);
    let (session, mut notices) = session(&store, &[account]);
    session.connect().await.unwrap();
    drain(&mut notices);

    let result = session.accounts_changed(Vec::new()).await.unwrap();

    assert_eq!(result, None);
    assert_eq!(session.current_account(), None);
    assert!(!session.view().is_connected());
    assert!(session.view().plans.is_empty());
    let messages: Vec<String> = drain(&mut notices).into_iter().map(|n| n.message).collect();
    assert_eq!(messages, vec!["Wallet disconnected".to_string()]);
}

#[tokio::test]
async fn disconnect_supersedes_in_flight_load() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 1)]);
    let gate = store.gate_claimable(account);
    let (session, _notices) = session(&store, &[account]);

    let load = session.accounts_changed(vec![account]);
    tokio::pin!(load);
    assert!(futures::poll!(&mut load).is_pending());

    session.accounts_changed(Vec::new()).await.unwrap();
    gate.release();
    load.await.unwrap();

    assert_eq!(session.current_account(), None);
    assert!(!session.view().is_connected());
}

// ---------------------------------------------------------------------------
// Refresh and claims
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_without_account_reports_failure() {
    let store = Arc::new(MemoryPlanStore::new());
    let (session, mut notices) = session(&store, &[addr(1)]);

    let err = session.refresh().await.unwrap_err();

    assert!(matches!(err, SessionError::NotConnected));
    assert_eq!(errors(&drain(&mut notices)), vec![LOAD_FAILED]);
}

#[tokio::test]
async fn refresh_failure_keeps_view_and_session_alive() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 1)]);
    let (session, mut notices) = session(&store, &[account]);
    session.connect().await.unwrap();
    let before = session.view();
    drain(&mut notices);

    store.fail_claimable(account, true);
    assert!(session.refresh().await.is_err());
    assert_eq!(*session.view(), *before);
    assert_eq!(errors(&drain(&mut notices)), vec![LOAD_FAILED]);

    store.fail_claimable(account, false);
    store.set_claimable(account, 1);
    assert!(session.refresh().await.unwrap().is_committed());
    assert_eq!(session.view().claimable_total, TokenAmount(1));
}

#[tokio::test]
async fn claim_one_reports_progress_and_success() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 5)]);
    store.set_claimable(account, 5);
    let (session, mut notices) = session(&store, &[account]);
    session.connect().await.unwrap();
    drain(&mut notices);

    session.claim_one(0).await.unwrap();

    let seen = drain(&mut notices);
    let levels: Vec<NoticeLevel> = seen.iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Success]);
    assert_eq!(seen[1].message, "Successfully claimed tokens");
    assert!(session.view().plans[0].claimed);
}

#[tokio::test]
async fn rejected_claim_all_reports_failure() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 5)]);
    let (session, mut notices) = session(&store, &[account]);
    session.connect().await.unwrap();
    let before = session.view();
    drain(&mut notices);
    store.reject_submissions(true);

    let err = session.claim_all().await.unwrap_err();

    assert!(matches!(err, SessionError::Claim(_)));
    assert_eq!(
        errors(&drain(&mut notices)),
        vec!["Failed to claim all tokens"]
    );
    assert_eq!(*session.view(), *before);
}

#[tokio::test]
async fn claim_without_account_reports_failure() {
    let store = Arc::new(MemoryPlanStore::new());
    let (session, mut notices) = session(&store, &[addr(1)]);

    let err = session.claim_all().await.unwrap_err();

    assert!(matches!(err, SessionError::NotConnected));
    assert_eq!(
        errors(&drain(&mut notices)),
        vec!["Failed to claim all tokens"]
    );
    assert!(store.submissions().is_empty());
}

#[tokio::test]
async fn claim_confirming_after_switch_keeps_new_account() {
    let store = Arc::new(MemoryPlanStore::new());
    let (a, b) = (addr(0xa), addr(0xb));
    store.set_plans(a, vec![record(1, 5)]);
    store.set_claimable(a, 5);
    store.set_plans(b, vec![record(2, 7), record(3, 8)]);
    store.set_claimable(b, 7);
    let gate = store.gate_confirmations();
    let (session, _notices) = session(&store, &[a, b]);
    session.connect().await.unwrap();

    let claim = session.claim_one(0);
    tokio::pin!(claim);
    assert!(futures::poll!(&mut claim).is_pending());
    assert_eq!(store.submissions(), vec![(a, ClaimRequest::Index(0))]);

    session.accounts_changed(vec![b]).await.unwrap();
    assert_eq!(session.view().account, Some(b));

    gate.release();
    let outcome = claim.await.unwrap();

    assert_eq!(outcome.receipt.account, a);
    assert!(matches!(
        &outcome.reconcile,
        Ok(ReconcileOutcome::Stale { account, current: Some(current) })
            if *account == a && *current == b
    ));
    assert_eq!(session.current_account(), Some(b));
    let view = session.view();
    assert_eq!(view.account, Some(b));
    assert_eq!(view.plans.len(), 2);
    assert_eq!(view.claimable_total, TokenAmount(7));
    // The claim itself still landed for a.
    assert!(store.plans(a)[0].claimed);
}

#[tokio::test]
async fn claim_confirming_after_disconnect_leaves_view_cleared() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 5)]);
    store.set_claimable(account, 5);
    let gate = store.gate_confirmations();
    let (session, mut notices) = session(&store, &[account]);
    session.connect().await.unwrap();
    drain(&mut notices);

    let claim = session.claim_all();
    tokio::pin!(claim);
    assert!(futures::poll!(&mut claim).is_pending());

    session.accounts_changed(Vec::new()).await.unwrap();
    gate.release();
    claim.await.unwrap();

    assert_eq!(session.current_account(), None);
    let view = session.view();
    assert!(!view.is_connected());
    assert!(view.plans.is_empty());
    assert!(errors(&drain(&mut notices)).is_empty());
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_loop_applies_events_and_commands() {
    let store = Arc::new(MemoryPlanStore::new());
    let (a, b) = (addr(0xa), addr(0xb));
    store.set_plans(a, vec![record(1, 1)]);
    store.set_plans(b, vec![record(2, 2), record(3, 3)]);
    store.set_claimable(b, 2);
    let (session, _notices) = session(&store, &[a, b]);
    let session = Arc::new(session);
    let mut view_rx = session.subscribe();

    let (event_tx, event_rx) = mpsc::channel(8);
    let (command_tx, command_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let runner = {
        let session = Arc::clone(&session);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(event_rx, command_rx, cancel).await })
    };

    command_tx.send(SessionCommand::Connect).await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        view_rx.wait_for(|v| v.account == Some(a)),
    )
    .await
    .expect("view for a should be published")
    .unwrap();

    event_tx
        .send(WalletEvent::AccountsChanged(vec![b]))
        .await
        .unwrap();
    let view = tokio::time::timeout(
        Duration::from_secs(5),
        view_rx.wait_for(|v| v.account == Some(b)),
    )
    .await
    .expect("view for b should be published")
    .unwrap()
    .clone();
    assert_eq!(view.plans.len(), 2);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("run loop should stop on cancel")
        .unwrap();
}

#[tokio::test]
async fn run_loop_exits_when_channels_close() {
    let store = Arc::new(MemoryPlanStore::new());
    let account = addr(1);
    store.set_plans(account, vec![record(1, 1)]);
    let (session, _notices) = session(&store, &[account]);

    let (event_tx, event_rx) = mpsc::channel::<WalletEvent>(1);
    let (command_tx, command_rx) = mpsc::channel(1);
    command_tx.send(SessionCommand::Connect).await.unwrap();
    drop(event_tx);
    drop(command_tx);

    tokio::time::timeout(
        Duration::from_secs(5),
        session.run(event_rx, command_rx, CancellationToken::new()),
    )
    .await
    .expect("run loop should drain and exit");

    // Queued work still completes before the loop exits.
    assert_eq!(session.view().account, Some(account));
}
