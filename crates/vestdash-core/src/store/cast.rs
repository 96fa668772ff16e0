//! Plan store backed by Foundry's `cast` CLI.
//!
//! Reads go through `cast call` with an explicit return signature so the
//! output is already ABI-decoded. Claims go through `cast send --async`,
//! which prints the transaction hash as soon as the node accepts it, and
//! confirmation waits in `cast receipt`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::trait_def::PlanStore;
use super::types::{ClaimRequest, PendingHandle, StoreError};
use crate::model::{Address, PlanRecord, TokenAmount};
use crate::wallet::{Signer, SigningMethod};

const USER_PLANS_SIG: &str = "userPlans(address,uint256)(uint256,uint256,uint256,bool)";
const CLAIMABLE_SIG: &str = "getClaimableAmount(address)(uint256)";
const CLAIM_INDEX_SIG: &str = "claimIndex(uint256)";
const CLAIM_ALL_SIG: &str = "claimAll()";

/// Connection settings for [`CastPlanStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastConfig {
    /// Path to the `cast` binary. Defaults to `"cast"` (found via `$PATH`).
    pub binary: String,
    pub rpc_url: String,
    /// Address of the release contract (the proxy, not the implementation).
    pub contract: Address,
    /// Block confirmations required before a claim counts as confirmed.
    pub confirmations: u32,
}

#[derive(Debug, Clone)]
pub struct CastPlanStore {
    config: CastConfig,
}

impl CastPlanStore {
    pub fn new(config: CastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CastConfig {
        &self.config
    }

    /// Run `cast` with `args` and return trimmed stdout.
    ///
    /// `label` is what gets logged; `args` may carry a private key and is
    /// never logged.
    async fn run_cast(&self, label: &str, args: &[String]) -> Result<String, StoreError> {
        debug!(binary = %self.config.binary, call = label, "running cast");

        let output = Command::new(&self.config.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StoreError::Unreachable(format!("failed to run {}: {e}", self.config.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(&stderr));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| StoreError::Malformed(format!("cast output is not UTF-8: {e}")))
    }

    fn rpc_args(&self) -> [String; 2] {
        ["--rpc-url".to_string(), self.config.rpc_url.clone()]
    }
}

#[async_trait]
impl PlanStore for CastPlanStore {
    fn name(&self) -> &str {
        "cast"
    }

    async fn lookup_plan(&self, account: &Address, index: u64) -> Result<PlanRecord, StoreError> {
        let mut args = vec![
            "call".to_string(),
            self.config.contract.to_string(),
            USER_PLANS_SIG.to_string(),
            account.to_string(),
            index.to_string(),
        ];
        args.extend(self.rpc_args());

        let stdout = self.run_cast("userPlans", &args).await?;
        parse_plan_record(&stdout)
    }

    async fn claimable_amount(&self, account: &Address) -> Result<TokenAmount, StoreError> {
        let mut args = vec![
            "call".to_string(),
            self.config.contract.to_string(),
            CLAIMABLE_SIG.to_string(),
            account.to_string(),
        ];
        args.extend(self.rpc_args());

        let stdout = self.run_cast("getClaimableAmount", &args).await?;
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| StoreError::Malformed("empty getClaimableAmount output".into()))?;
        parse_uint(line).map(TokenAmount)
    }

    async fn submit_claim(
        &self,
        signer: &Signer,
        request: ClaimRequest,
    ) -> Result<PendingHandle, StoreError> {
        let mut args = vec![
            "send".to_string(),
            "--async".to_string(),
            self.config.contract.to_string(),
        ];
        match request {
            ClaimRequest::Index(index) => {
                args.push(CLAIM_INDEX_SIG.to_string());
                args.push(index.to_string());
            }
            ClaimRequest::All => args.push(CLAIM_ALL_SIG.to_string()),
        }
        args.extend(self.rpc_args());
        args.extend(signer_args(signer)?);

        let stdout = self.run_cast("send", &args).await?;
        parse_tx_hash(&stdout)
    }

    async fn await_confirmation(&self, handle: &PendingHandle) -> Result<(), StoreError> {
        let mut args = vec![
            "receipt".to_string(),
            handle.as_str().to_string(),
            "status".to_string(),
            "--confirmations".to_string(),
            self.config.confirmations.to_string(),
        ];
        args.extend(self.rpc_args());

        let stdout = self.run_cast("receipt", &args).await?;
        if parse_receipt_status(&stdout)? {
            Ok(())
        } else {
            warn!(tx = %handle, "claim transaction reverted");
            Err(StoreError::TransactionFailed(handle.clone()))
        }
    }
}

// ---------------------------------------------------------------------------
// Argument building
// ---------------------------------------------------------------------------

fn signer_args(signer: &Signer) -> Result<Vec<String>, StoreError> {
    let mut args = vec!["--from".to_string(), signer.account.to_string()];
    match &signer.method {
        SigningMethod::Unlocked => args.push("--unlocked".to_string()),
        SigningMethod::PrivateKeyEnv { var } => {
            let key = std::env::var(var).map_err(|_| {
                StoreError::Unreachable(format!("signing key variable {var} is not set"))
            })?;
            args.push("--private-key".to_string());
            args.push(key);
        }
        SigningMethod::Keystore {
            path,
            password_file,
        } => {
            args.push("--keystore".to_string());
            args.push(path.to_string_lossy().into_owned());
            if let Some(pw) = password_file {
                args.push("--password-file".to_string());
                args.push(pw.to_string_lossy().into_owned());
            }
        }
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

fn classify_failure(stderr: &str) -> StoreError {
    if stderr.to_ascii_lowercase().contains("revert") {
        StoreError::Reverted(stderr.to_string())
    } else {
        StoreError::Unreachable(stderr.to_string())
    }
}

/// Parse one decoded `uint256` line. `cast` may append a scientific
/// notation hint such as `[1e18]`, which is ignored.
fn parse_uint(line: &str) -> Result<u128, StoreError> {
    let token = line
        .split_whitespace()
        .next()
        .ok_or_else(|| StoreError::Malformed("empty numeric field".into()))?;

    let parsed = match token.strip_prefix("0x") {
        Some(hex_digits) => u128::from_str_radix(hex_digits, 16),
        None => token.parse::<u128>(),
    };
    parsed.map_err(|e| StoreError::Malformed(format!("invalid uint {token:?}: {e}")))
}

fn parse_bool(line: &str) -> Result<bool, StoreError> {
    match line.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(StoreError::Malformed(format!("invalid bool {other:?}"))),
    }
}

fn parse_plan_record(stdout: &str) -> Result<PlanRecord, StoreError> {
    let fields: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    let [start, amount, compensation, claimed] = fields.as_slice() else {
        return Err(StoreError::Malformed(format!(
            "userPlans returned {} fields, expected 4",
            fields.len()
        )));
    };

    let start_time = u64::try_from(parse_uint(start)?)
        .map_err(|_| StoreError::Malformed(format!("start time {start:?} out of range")))?;

    Ok(PlanRecord {
        start_time,
        amount: TokenAmount(parse_uint(amount)?),
        delay_compensation_amount: TokenAmount(parse_uint(compensation)?),
        claimed: parse_bool(claimed)?,
    })
}

fn parse_tx_hash(stdout: &str) -> Result<PendingHandle, StoreError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| StoreError::Malformed("cast send printed nothing".into()))?;

    let is_hash = line.len() == 66
        && line.starts_with("0x")
        && line[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !is_hash {
        return Err(StoreError::Malformed(format!(
            "expected transaction hash, got {line:?}"
        )));
    }
    Ok(PendingHandle::new(line))
}

/// `cast receipt <tx> status` prints `1 (success)` or `0 (failed)`.
fn parse_receipt_status(stdout: &str) -> Result<bool, StoreError> {
    match stdout.split_whitespace().next() {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        _ => Err(StoreError::Malformed(format!(
            "unexpected receipt status {stdout:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "0x8e3d3e1c4b3e1f2a6e3b1b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f80";

    #[test]
    fn parses_user_plans_output_with_hints() {
        let out = "1700000000 [1.7e9]\n1000000000000000000 [1e18]\n0\nfalse\n";
        let record = parse_plan_record(out).unwrap();
        assert_eq!(record.start_time, 1_700_000_000);
        assert_eq!(record.amount, TokenAmount(1_000_000_000_000_000_000));
        assert_eq!(record.delay_compensation_amount, TokenAmount::ZERO);
        assert!(!record.claimed);
    }

    #[test]
    fn rejects_short_user_plans_output() {
        let err = parse_plan_record("1\n2\n").unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn parses_hex_uint() {
        assert_eq!(parse_uint("0xff").unwrap(), 255);
    }

    #[test]
    fn parses_tx_hash_from_last_line() {
        let out = format!("warning: something\n{TX}\n");
        assert_eq!(parse_tx_hash(&out).unwrap().as_str(), TX);
        assert!(parse_tx_hash("not a hash").is_err());
    }

    #[test]
    fn parses_receipt_status() {
        assert!(parse_receipt_status("1 (success)").unwrap());
        assert!(!parse_receipt_status("0 (failed)").unwrap());
        assert!(parse_receipt_status("pending").is_err());
    }

    #[test]
    fn revert_is_classified_separately() {
        assert!(matches!(
            classify_failure("Error: execution reverted: Invalid index"),
            StoreError::Reverted(_)
        ));
        assert!(matches!(
            classify_failure("error sending request for url"),
            StoreError::Unreachable(_)
        ));
    }

    #[test]
    fn signer_args_for_keystore() {
        let signer = Signer {
            account: Address::ZERO,
            method: SigningMethod::Keystore {
                path: "/keys/a.json".into(),
                password_file: Some("/keys/pw".into()),
            },
        };
        let args = signer_args(&signer).unwrap();
        assert_eq!(
            args,
            vec![
                "--from",
                "0x0000000000000000000000000000000000000000",
                "--keystore",
                "/keys/a.json",
                "--password-file",
                "/keys/pw",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_unreachable() {
        let store = CastPlanStore::new(CastConfig {
            binary: "/nonexistent/vestdash-cast".to_string(),
            rpc_url: "http://127.0.0.1:1".to_string(),
            contract: Address::ZERO,
            confirmations: 1,
        });
        let err = store.claimable_amount(&Address::ZERO).await.unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
    }
}
