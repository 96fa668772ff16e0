//! `vestdash plans` command: connect once and print the account's plans.

use anyhow::Result;

use vestdash_core::model::now_epoch_secs;
use vestdash_core::session::{
    CONNECT_FAILED, LOAD_FAILED, NoticeLevel, NoticeReceiver, SessionError,
};

use crate::context::AppContext;
use crate::display;

pub async fn run_plans(mut ctx: AppContext) -> Result<()> {
    let result = ctx.session.connect().await;
    print_notices(&mut ctx.notices);
    connected(result)?;

    let view = ctx.session.view();
    print!("{}", display::render_view(&view, &ctx.display, now_epoch_secs()));
    Ok(())
}

/// Label a failed connect by the step that failed: the wallet, or the
/// first load of the account's data.
pub fn connected<T>(result: Result<T, SessionError>) -> Result<T> {
    result.map_err(|err| {
        let message = match &err {
            SessionError::Reconcile(_) => LOAD_FAILED,
            _ => CONNECT_FAILED,
        };
        anyhow::Error::new(err).context(message)
    })
}

/// Echo informational notices to stderr. Errors are reported by the
/// caller through the returned error instead.
pub fn print_notices(notices: &mut NoticeReceiver) {
    while let Ok(notice) = notices.try_recv() {
        if notice.level != NoticeLevel::Error {
            eprintln!("{}", notice.message);
        }
    }
}
