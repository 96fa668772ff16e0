//! Helpers shared by unit tests in this crate.

use std::sync::{Mutex, MutexGuard};

use crate::config::{ENV_ACCOUNT, ENV_CONTRACT, ENV_RPC_URL};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that read or write process environment variables.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Remove every `VESTDASH_*` override. Call with the env lock held.
pub fn clear_env() {
    unsafe { std::env::remove_var(ENV_RPC_URL) };
    unsafe { std::env::remove_var(ENV_CONTRACT) };
    unsafe { std::env::remove_var(ENV_ACCOUNT) };
}
