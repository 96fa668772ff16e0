//! `vestdash claim` and `vestdash claim-all`: connect, claim, print the result.

use anyhow::{Context, Result};

use vestdash_core::model::now_epoch_secs;
use vestdash_core::store::ClaimRequest;

use crate::context::AppContext;
use crate::display;
use crate::plans_cmd::{connected, print_notices};

pub async fn run_claim(mut ctx: AppContext, request: ClaimRequest) -> Result<()> {
    let result = ctx.session.connect().await;
    print_notices(&mut ctx.notices);
    connected(result)?;

    let result = match request {
        ClaimRequest::Index(index) => ctx.session.claim_one(index).await,
        ClaimRequest::All => ctx.session.claim_all().await,
    };
    print_notices(&mut ctx.notices);
    let outcome = result.context(request.failure_message())?;

    println!("Transaction {} confirmed.", outcome.receipt.handle);
    if let Err(err) = &outcome.reconcile {
        eprintln!("warning: claim confirmed but reload failed: {err}");
    }
    let view = ctx.session.view();
    print!("{}", display::render_view(&view, &ctx.display, now_epoch_secs()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vestdash_test_utils::{MemoryPlanStore, addr, record};

    use super::*;
    use crate::config::{Overrides, VestdashConfig};

    fn context(store: Arc<MemoryPlanStore>) -> AppContext {
        let _lock = crate::test_util::lock_env();
        crate::test_util::clear_env();
        let mut config = VestdashConfig::resolve_with(None, Overrides::default()).unwrap();
        config.accounts = vec![addr(1)];
        AppContext::with_store(&config, store)
    }

    #[tokio::test]
    async fn claim_index_marks_plan_claimed() {
        let store = Arc::new(MemoryPlanStore::new());
        store.set_plans(addr(1), vec![record(1, 5), record(2, 5)]);
        let ctx = context(store.clone());
        let session = Arc::clone(&ctx.session);

        run_claim(ctx, ClaimRequest::Index(1)).await.unwrap();

        assert!(!session.view().plans[0].claimed);
        assert!(session.view().plans[1].claimed);
    }

    #[tokio::test]
    async fn rejected_claim_all_reports_failure_message() {
        let store = Arc::new(MemoryPlanStore::new());
        store.set_plans(addr(1), vec![record(1, 5)]);
        store.reject_submissions(true);
        let ctx = context(store);

        let err = run_claim(ctx, ClaimRequest::All).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to claim all tokens");
    }

    #[tokio::test]
    async fn load_failure_stops_before_submission() {
        let store = Arc::new(MemoryPlanStore::new());
        store.set_plans(addr(1), vec![record(1, 5)]);
        store.fail_claimable(addr(1), true);
        let ctx = context(store.clone());

        let err = run_claim(ctx, ClaimRequest::Index(0)).await.unwrap_err();

        assert_eq!(err.to_string(), vestdash_core::session::LOAD_FAILED);
        assert!(store.submissions().is_empty());
    }
}
