//! Release plans and the derived account session view.

mod address;
mod amount;

pub use address::{Address, AddressError};
pub use amount::TokenAmount;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The raw tuple returned by one indexed plan lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Epoch seconds at or after which the release becomes claimable.
    pub start_time: u64,
    pub amount: TokenAmount,
    pub delay_compensation_amount: TokenAmount,
    pub claimed: bool,
}

/// One scheduled disbursement for one account.
///
/// `index` is assigned by the plan store in creation order. For a given
/// account the indices are dense and start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub index: u64,
    pub start_time: u64,
    pub amount: TokenAmount,
    /// Bonus accrued for a late claim. Informational only.
    pub delay_compensation_amount: TokenAmount,
    pub claimed: bool,
}

impl ReleasePlan {
    pub fn from_record(index: u64, record: PlanRecord) -> Self {
        Self {
            index,
            start_time: record.start_time,
            amount: record.amount,
            delay_compensation_amount: record.delay_compensation_amount,
            claimed: record.claimed,
        }
    }

    /// Whether the plan is unclaimed and its start time has passed.
    ///
    /// This is a presentation hint only. Claim eligibility is decided by
    /// the plan store.
    pub fn is_claimable_at(&self, now: u64) -> bool {
        !self.claimed && self.start_time <= now
    }

    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.start_time)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Snapshot of one account's plans and aggregate claimable amount.
///
/// Produced only by the reconciler and always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Connected account, `None` when disconnected.
    pub account: Option<Address>,
    /// Index-ascending, as of the last reconciliation.
    pub plans: Vec<ReleasePlan>,
    /// Reported independently by the plan store. Not required to equal
    /// the sum of unclaimed plan amounts.
    pub claimable_total: TokenAmount,
    /// Reconciliation that produced this view; 0 for the initial view.
    pub generation: u64,
}

impl SessionView {
    pub fn empty() -> Self {
        Self {
            account: None,
            plans: Vec::new(),
            claimable_total: TokenAmount::ZERO,
            generation: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn plan(&self, index: u64) -> Option<&ReleasePlan> {
        // Dense indices let us go straight to the slot.
        usize::try_from(index)
            .ok()
            .and_then(|i| self.plans.get(i))
            .filter(|p| p.index == index)
    }

    pub fn unclaimed(&self) -> impl Iterator<Item = &ReleasePlan> {
        self.plans.iter().filter(|p| !p.claimed)
    }

    pub fn claimable_at(&self, now: u64) -> impl Iterator<Item = &ReleasePlan> {
        self.plans.iter().filter(move |p| p.is_claimable_at(now))
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::empty()
    }
}

/// Current wall-clock time in epoch seconds.
pub fn now_epoch_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
