//! TUI application state.
//!
//! The app never calls the session directly. It sends commands and wallet
//! events into the channels [`Session::run`](vestdash_core::session::Session::run)
//! consumes, and reads back the published view and notices.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use vestdash_core::model::{Address, ReleasePlan, SessionView, now_epoch_secs};
use vestdash_core::session::{Notice, NoticeReceiver, SessionCommand};
use vestdash_core::wallet::WalletEvent;

use crate::config::DisplaySection;

/// Which view the TUI is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Plans,
    Help,
}

/// Channels into and out of the running session.
pub struct SessionLink {
    pub view: watch::Receiver<Arc<SessionView>>,
    pub notices: NoticeReceiver,
    pub commands: mpsc::Sender<SessionCommand>,
    pub events: mpsc::Sender<WalletEvent>,
}

/// Application state for the TUI.
pub struct App {
    link: SessionLink,
    pub view: Arc<SessionView>,
    pub current_view: View,
    /// Accounts the wallet manages, used for switching.
    pub accounts: Vec<Address>,
    pub display: DisplaySection,
    pub selected: usize,
    pub tick_rate: Duration,
    pub should_quit: bool,
    pub status: Option<Notice>,
}

impl App {
    pub fn new(link: SessionLink, accounts: Vec<Address>, display: DisplaySection) -> Self {
        let view = Arc::clone(&link.view.borrow());
        Self {
            link,
            view,
            current_view: View::Plans,
            accounts,
            display,
            selected: 0,
            tick_rate: Duration::from_millis(250),
            should_quit: false,
            status: None,
        }
    }

    /// Pull the latest published view and any pending notices.
    pub fn sync(&mut self) {
        if self.link.view.has_changed().unwrap_or(false) {
            self.view = Arc::clone(&self.link.view.borrow_and_update());
            if self.selected >= self.view.plans.len() {
                self.selected = self.view.plans.len().saturating_sub(1);
            }
        }
        while let Ok(notice) = self.link.notices.try_recv() {
            self.status = Some(notice);
        }
    }

    pub fn selected_plan(&self) -> Option<&ReleasePlan> {
        self.view.plans.get(self.selected)
    }

    // -- Navigation --

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if !self.view.plans.is_empty() && self.selected < self.view.plans.len() - 1 {
            self.selected += 1;
        }
    }

    pub fn navigate_back(&mut self) {
        match self.current_view {
            View::Plans => self.should_quit = true,
            View::Help => self.current_view = View::Plans,
        }
    }

    pub fn show_help(&mut self) {
        self.current_view = View::Help;
    }

    // -- Actions --

    pub fn connect(&mut self) {
        self.send(SessionCommand::Connect);
    }

    pub fn refresh(&mut self) {
        if self.view.is_connected() {
            self.send(SessionCommand::Refresh);
        }
    }

    /// Claim the selected plan if it is unclaimed and has started.
    pub fn claim_selected(&mut self) {
        let now = now_epoch_secs();
        let Some(plan) = self.selected_plan().copied() else {
            return;
        };
        if plan.claimed {
            self.set_status(Notice::info(format!("Plan {} is already claimed", plan.index)));
        } else if !plan.is_claimable_at(now) {
            self.set_status(Notice::info(format!(
                "Plan {} is not claimable yet",
                plan.index
            )));
        } else {
            self.send(SessionCommand::ClaimOne(plan.index));
        }
    }

    /// Claim everything, offered only while the claimable total is positive.
    pub fn claim_all(&mut self) {
        if !self.view.is_connected() {
            return;
        }
        if self.view.claimable_total.is_zero() {
            self.set_status(Notice::info("Nothing to claim"));
            return;
        }
        self.send(SessionCommand::ClaimAll);
    }

    /// Make the next managed account the active one.
    pub fn switch_account(&mut self) {
        if self.accounts.len() < 2 {
            self.set_status(Notice::info("No other account to switch to"));
            return;
        }
        let current = self
            .view
            .account
            .and_then(|a| self.accounts.iter().position(|x| *x == a))
            .unwrap_or(self.accounts.len() - 1);
        let mut rotated = self.accounts.clone();
        rotated.rotate_left((current + 1) % self.accounts.len());
        self.emit(WalletEvent::AccountsChanged(rotated));
    }

    pub fn disconnect(&mut self) {
        self.emit(WalletEvent::AccountsChanged(Vec::new()));
    }

    fn set_status(&mut self, notice: Notice) {
        self.status = Some(notice);
    }

    fn send(&mut self, command: SessionCommand) {
        if self.link.commands.try_send(command).is_err() {
            self.set_status(Notice::error("Busy, try again", "command queue full"));
        }
    }

    fn emit(&mut self, event: WalletEvent) {
        if self.link.events.try_send(event).is_err() {
            self.set_status(Notice::error("Busy, try again", "event queue full"));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use vestdash_core::model::TokenAmount;
    use vestdash_core::session::NoticeLevel;

    struct Harness {
        app: App,
        view_tx: watch::Sender<Arc<SessionView>>,
        notice_tx: mpsc::UnboundedSender<Notice>,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Receiver<WalletEvent>,
    }

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn harness(accounts: Vec<Address>) -> Harness {
        let (view_tx, view_rx) = watch::channel(Arc::new(SessionView::empty()));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::channel(8);
        let (event_tx, events) = mpsc::channel(8);
        let link = SessionLink {
            view: view_rx,
            notices: notice_rx,
            commands: command_tx,
            events: event_tx,
        };
        Harness {
            app: App::new(link, accounts, DisplaySection::default()),
            view_tx,
            notice_tx,
            commands,
            events,
        }
    }

    fn plan(index: u64, start_time: u64, claimed: bool) -> ReleasePlan {
        ReleasePlan {
            index,
            start_time,
            amount: TokenAmount(10),
            delay_compensation_amount: TokenAmount::ZERO,
            claimed,
        }
    }

    fn publish(h: &mut Harness, account: Address, plans: Vec<ReleasePlan>, claimable: u128) {
        h.view_tx.send_replace(Arc::new(SessionView {
            account: Some(account),
            plans,
            claimable_total: TokenAmount(claimable),
            generation: 1,
        }));
        h.app.sync();
    }

    #[test]
    fn sync_picks_up_view_and_notices() {
        let mut h = harness(vec![addr(1)]);
        publish(&mut h, addr(1), vec![plan(0, 0, false)], 10);
        h.notice_tx.send(Notice::success("done")).unwrap();
        h.app.sync();

        assert_eq!(h.app.view.account, Some(addr(1)));
        assert_eq!(
            h.app.status.as_ref().map(|n| n.level),
            Some(NoticeLevel::Success)
        );
    }

    #[test]
    fn selection_is_clamped_when_plans_shrink() {
        let mut h = harness(vec![addr(1)]);
        publish(
            &mut h,
            addr(1),
            vec![plan(0, 0, false), plan(1, 0, false), plan(2, 0, false)],
            0,
        );
        h.app.move_down();
        h.app.move_down();
        h.app.move_down();
        assert_eq!(h.app.selected, 2);

        publish(&mut h, addr(1), vec![plan(0, 0, false)], 0);
        assert_eq!(h.app.selected, 0);
    }

    #[test]
    fn claim_selected_sends_only_for_started_unclaimed_plan() {
        let mut h = harness(vec![addr(1)]);
        let future = now_epoch_secs() + 86_400;
        publish(
            &mut h,
            addr(1),
            vec![plan(0, 0, false), plan(1, 0, true), plan(2, future, false)],
            10,
        );

        h.app.claim_selected();
        assert_eq!(h.commands.try_recv().unwrap(), SessionCommand::ClaimOne(0));

        h.app.move_down();
        h.app.claim_selected();
        h.app.move_down();
        h.app.claim_selected();
        assert!(h.commands.try_recv().is_err());
        assert!(h.app.status.is_some());
    }

    #[test]
    fn claim_all_requires_positive_claimable() {
        let mut h = harness(vec![addr(1)]);
        publish(&mut h, addr(1), vec![plan(0, 0, false)], 0);
        h.app.claim_all();
        assert!(h.commands.try_recv().is_err());

        publish(&mut h, addr(1), vec![plan(0, 0, false)], 5);
        h.app.claim_all();
        assert_eq!(h.commands.try_recv().unwrap(), SessionCommand::ClaimAll);
    }

    #[test]
    fn switch_account_rotates_to_next() {
        let (a, b, c) = (addr(1), addr(2), addr(3));
        let mut h = harness(vec![a, b, c]);
        publish(&mut h, b, Vec::new(), 0);

        h.app.switch_account();

        assert_eq!(
            h.events.try_recv().unwrap(),
            WalletEvent::AccountsChanged(vec![c, a, b])
        );
    }

    #[test]
    fn switch_account_when_disconnected_starts_at_first() {
        let (a, b) = (addr(1), addr(2));
        let mut h = harness(vec![a, b]);

        h.app.switch_account();

        assert_eq!(
            h.events.try_recv().unwrap(),
            WalletEvent::AccountsChanged(vec![a, b])
        );
    }

    #[test]
    fn disconnect_sends_empty_account_list() {
        let mut h = harness(vec![addr(1)]);
        h.app.disconnect();
        assert_eq!(
            h.events.try_recv().unwrap(),
            WalletEvent::AccountsChanged(Vec::new())
        );
    }

    #[test]
    fn refresh_is_ignored_while_disconnected() {
        let mut h = harness(vec![addr(1)]);
        h.app.refresh();
        assert!(h.commands.try_recv().is_err());

        h.app.connect();
        assert_eq!(h.commands.try_recv().unwrap(), SessionCommand::Connect);
    }

    #[test]
    fn back_from_help_returns_to_plans() {
        let mut h = harness(Vec::new());
        h.app.show_help();
        h.app.navigate_back();
        assert_eq!(h.app.current_view, View::Plans);
        assert!(!h.app.should_quit);
        h.app.navigate_back();
        assert!(h.app.should_quit);
    }
}
