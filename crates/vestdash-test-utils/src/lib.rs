//! Shared test utilities for vestdash integration tests.
//!
//! Provides [`MemoryPlanStore`], an in-memory stand-in for the release
//! contract with failure injection, per-account gates for ordering
//! concurrent reads deterministically, and a log of every lookup issued.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use vestdash_core::model::{Address, PlanRecord, TokenAmount};
use vestdash_core::store::{ClaimRequest, PendingHandle, PlanStore, StoreError};
use vestdash_core::wallet::{Signer, SigningMethod, StaticWallet};

/// Deterministic test address built from a single repeated byte.
pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

/// An unclaimed plan record.
pub fn record(start_time: u64, amount: u128) -> PlanRecord {
    PlanRecord {
        start_time,
        amount: TokenAmount(amount),
        delay_compensation_amount: TokenAmount::ZERO,
        claimed: false,
    }
}

/// A wallet holding `accounts` with an unlocked signer.
pub fn wallet(accounts: &[Address]) -> StaticWallet {
    StaticWallet::new(accounts.to_vec(), SigningMethod::Unlocked)
}

/// A manually released barrier.
///
/// A store call that hits a gate blocks until [`Gate::release`] is called
/// once per call to let through. Releasing before the call arrives is fine.
#[derive(Debug, Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn release(&self) {
        self.0.add_permits(1);
    }

    async fn wait(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default)]
struct AccountState {
    plans: Vec<PlanRecord>,
    claimable: TokenAmount,
    /// Remaining injected failures per index.
    lookup_failures: HashMap<u64, u32>,
    fail_claimable: bool,
    claimable_gate: Option<Gate>,
}

#[derive(Debug, Clone)]
struct PendingClaim {
    account: Address,
    request: ClaimRequest,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Address, AccountState>,
    lookups: Vec<(Address, u64)>,
    claimable_queries: Vec<Address>,
    submissions: Vec<(Address, ClaimRequest)>,
    pending: HashMap<PendingHandle, PendingClaim>,
    next_tx: u64,
    report_count: bool,
    reject_submissions: bool,
    fail_confirmations: bool,
    confirmation_gate: Option<Gate>,
    /// Handles whose confirmation wait never returns.
    hang_confirmations: bool,
    unreachable: HashSet<Address>,
}

/// In-memory release contract.
///
/// Confirming `Index(i)` marks plan `i` claimed and subtracts its amount
/// from the claimable total; it reverts if the plan is missing or already
/// claimed. Confirming `All` marks every plan claimed and zeroes the total.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    state: Mutex<State>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store mutex poisoned")
    }

    // -- Setup --

    pub fn set_plans(&self, account: Address, plans: Vec<PlanRecord>) {
        self.lock().accounts.entry(account).or_default().plans = plans;
    }

    pub fn set_claimable(&self, account: Address, amount: u128) {
        self.lock().accounts.entry(account).or_default().claimable = TokenAmount(amount);
    }

    pub fn push_plan(&self, account: Address, plan: PlanRecord) {
        self.lock().accounts.entry(account).or_default().plans.push(plan);
    }

    /// Make the next `times` lookups of `index` fail.
    pub fn fail_lookup(&self, account: Address, index: u64, times: u32) {
        self.lock()
            .accounts
            .entry(account)
            .or_default()
            .lookup_failures
            .insert(index, times);
    }

    pub fn fail_claimable(&self, account: Address, fail: bool) {
        self.lock().accounts.entry(account).or_default().fail_claimable = fail;
    }

    /// Every read for `account` fails until cleared.
    pub fn set_unreachable(&self, account: Address, unreachable: bool) {
        let mut state = self.lock();
        if unreachable {
            state.unreachable.insert(account);
        } else {
            state.unreachable.remove(&account);
        }
    }

    /// Hold `claimable_amount` for `account` until the gate is released.
    pub fn gate_claimable(&self, account: Address) -> Gate {
        let gate = Gate::new();
        self.lock().accounts.entry(account).or_default().claimable_gate = Some(gate.clone());
        gate
    }

    /// Hold every `await_confirmation` until the gate is released.
    pub fn gate_confirmations(&self) -> Gate {
        let gate = Gate::new();
        self.lock().confirmation_gate = Some(gate.clone());
        gate
    }

    /// Answer `plan_count` with the real count instead of `None`.
    pub fn report_count(&self, enabled: bool) {
        self.lock().report_count = enabled;
    }

    pub fn reject_submissions(&self, reject: bool) {
        self.lock().reject_submissions = reject;
    }

    pub fn fail_confirmations(&self, fail: bool) {
        self.lock().fail_confirmations = fail;
    }

    pub fn hang_confirmations(&self, hang: bool) {
        self.lock().hang_confirmations = hang;
    }

    // -- Inspection --

    pub fn plans(&self, account: Address) -> Vec<PlanRecord> {
        self.lock()
            .accounts
            .get(&account)
            .map(|a| a.plans.clone())
            .unwrap_or_default()
    }

    /// Every `(account, index)` lookup issued, in order.
    pub fn lookups(&self) -> Vec<(Address, u64)> {
        self.lock().lookups.clone()
    }

    pub fn claimable_queries(&self) -> Vec<Address> {
        self.lock().claimable_queries.clone()
    }

    pub fn submissions(&self) -> Vec<(Address, ClaimRequest)> {
        self.lock().submissions.clone()
    }

    fn apply(state: &mut State, claim: &PendingClaim) -> Result<(), String> {
        let account = state
            .accounts
            .get_mut(&claim.account)
            .ok_or_else(|| "no plans for account".to_string())?;
        match claim.request {
            ClaimRequest::Index(index) => {
                let slot = usize::try_from(index).map_err(|e| e.to_string())?;
                let plan = account
                    .plans
                    .get_mut(slot)
                    .ok_or_else(|| format!("Invalid index {index}"))?;
                if plan.claimed {
                    return Err(format!("Already claimed {index}"));
                }
                plan.claimed = true;
                account.claimable = account.claimable.saturating_sub(plan.amount);
            }
            ClaimRequest::All => {
                for plan in &mut account.plans {
                    plan.claimed = true;
                }
                account.claimable = TokenAmount::ZERO;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn lookup_plan(&self, account: &Address, index: u64) -> Result<PlanRecord, StoreError> {
        let mut state = self.lock();
        state.lookups.push((*account, index));
        if state.unreachable.contains(account) {
            return Err(StoreError::Unreachable("injected outage".into()));
        }
        let entry = state.accounts.entry(*account).or_default();
        if let Some(remaining) = entry.lookup_failures.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unreachable("injected lookup failure".into()));
            }
        }
        usize::try_from(index)
            .ok()
            .and_then(|i| entry.plans.get(i).copied())
            .ok_or_else(|| StoreError::Reverted(format!("no plan at index {index}")))
    }

    async fn plan_count(&self, account: &Address) -> Result<Option<u64>, StoreError> {
        let state = self.lock();
        if !state.report_count {
            return Ok(None);
        }
        if state.unreachable.contains(account) {
            return Err(StoreError::Unreachable("injected outage".into()));
        }
        let count = state
            .accounts
            .get(account)
            .map(|a| a.plans.len() as u64)
            .unwrap_or(0);
        Ok(Some(count))
    }

    async fn claimable_amount(&self, account: &Address) -> Result<TokenAmount, StoreError> {
        let gate = {
            let mut state = self.lock();
            state.claimable_queries.push(*account);
            state.accounts.get(account).and_then(|a| a.claimable_gate.clone())
        };
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let state = self.lock();
        if state.unreachable.contains(account) {
            return Err(StoreError::Unreachable("injected outage".into()));
        }
        match state.accounts.get(account) {
            Some(a) if a.fail_claimable => {
                Err(StoreError::Unreachable("injected claimable failure".into()))
            }
            Some(a) => Ok(a.claimable),
            None => Ok(TokenAmount::ZERO),
        }
    }

    async fn submit_claim(
        &self,
        signer: &Signer,
        request: ClaimRequest,
    ) -> Result<PendingHandle, StoreError> {
        let mut state = self.lock();
        state.submissions.push((signer.account, request));
        if state.reject_submissions {
            return Err(StoreError::Reverted("user rejected transaction".into()));
        }
        state.next_tx += 1;
        let handle = PendingHandle::new(format!("0x{:064x}", state.next_tx));
        state.pending.insert(
            handle.clone(),
            PendingClaim {
                account: signer.account,
                request,
            },
        );
        Ok(handle)
    }

    async fn await_confirmation(&self, handle: &PendingHandle) -> Result<(), StoreError> {
        let (gate, hang) = {
            let state = self.lock();
            (state.confirmation_gate.clone(), state.hang_confirmations)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let mut state = self.lock();
        let claim = state
            .pending
            .remove(handle)
            .ok_or_else(|| StoreError::Malformed(format!("unknown transaction {handle}")))?;
        if state.fail_confirmations {
            return Err(StoreError::TransactionFailed(handle.clone()));
        }
        // A revert at execution time surfaces as a failed receipt.
        Self::apply(&mut state, &claim).map_err(|_| StoreError::TransactionFailed(handle.clone()))
    }
}
