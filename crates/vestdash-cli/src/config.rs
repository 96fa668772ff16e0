//! Configuration file management for vestdash.
//!
//! Provides a TOML-based config file at `~/.config/vestdash/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vestdash_core::claim::{ClaimConfig, DEFAULT_CONFIRMATION_TIMEOUT};
use vestdash_core::discovery::ProbePolicy;
use vestdash_core::model::Address;
use vestdash_core::session::SessionConfig;
use vestdash_core::store::CastConfig;
use vestdash_core::wallet::SigningMethod;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// First contract a fresh local devnet deploys to.
pub const DEFAULT_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const DEFAULT_CAST_BINARY: &str = "cast";

pub const ENV_RPC_URL: &str = "VESTDASH_RPC_URL";
pub const ENV_CONTRACT: &str = "VESTDASH_CONTRACT";
pub const ENV_ACCOUNT: &str = "VESTDASH_ACCOUNT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub chain: ChainSection,
    #[serde(default)]
    pub wallet: WalletSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub discovery: ProbePolicy,
    #[serde(default)]
    pub claims: ClaimsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    pub rpc_url: String,
    pub contract: Address,
    #[serde(default = "default_cast_binary")]
    pub cast_binary: String,
    #[serde(default = "default_confirmations")]
    pub confirmations: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletSection {
    #[serde(default)]
    pub accounts: Vec<Address>,
    #[serde(default)]
    pub signer: SigningMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySection {
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            symbol: default_symbol(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsSection {
    /// `0` waits for confirmation indefinitely.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl Default for ClaimsSection {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

fn default_cast_binary() -> String {
    DEFAULT_CAST_BINARY.to_string()
}

fn default_confirmations() -> u32 {
    1
}

fn default_decimals() -> u8 {
    18
}

fn default_symbol() -> String {
    "Tokens".to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT.as_secs()
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the vestdash config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/vestdash` or `~/.config/vestdash`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vestdash");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("vestdash")
}

/// Return the path to the vestdash config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

/// Load the config file if it exists. A file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("in {}", path.display()))
        .map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides<'a> {
    pub rpc_url: Option<&'a str>,
    pub contract: Option<&'a str>,
    pub account: Option<&'a str>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct VestdashConfig {
    pub cast: CastConfig,
    /// Wallet accounts; the first one is connected first.
    pub accounts: Vec<Address>,
    pub signer: SigningMethod,
    pub display: DisplaySection,
    pub session: SessionConfig,
}

impl VestdashConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    pub fn resolve(overrides: Overrides<'_>) -> Result<Self> {
        Self::resolve_with(load_config()?, overrides)
    }

    /// - RPC URL: `--rpc-url` > `VESTDASH_RPC_URL` > `chain.rpc_url` > localhost
    /// - Contract: `--contract` > `VESTDASH_CONTRACT` > `chain.contract` > devnet default
    /// - Account: `--account` > `VESTDASH_ACCOUNT` is moved to the front of
    ///   `wallet.accounts` (or added if absent)
    pub fn resolve_with(file: Option<ConfigFile>, overrides: Overrides<'_>) -> Result<Self> {
        let env_rpc = std::env::var(ENV_RPC_URL).ok();
        let env_contract = std::env::var(ENV_CONTRACT).ok();
        let env_account = std::env::var(ENV_ACCOUNT).ok();

        let rpc_url = match (overrides.rpc_url, env_rpc, &file) {
            (Some(url), _, _) => url.to_string(),
            (None, Some(url), _) => url,
            (None, None, Some(cfg)) => cfg.chain.rpc_url.clone(),
            (None, None, None) => DEFAULT_RPC_URL.to_string(),
        };

        let contract = match (overrides.contract, env_contract, &file) {
            (Some(raw), _, _) => parse_address(raw, "--contract")?,
            (None, Some(raw), _) => parse_address(&raw, ENV_CONTRACT)?,
            (None, None, Some(cfg)) => cfg.chain.contract,
            (None, None, None) => parse_address(DEFAULT_CONTRACT, "default contract")?,
        };

        let file = file.unwrap_or_else(|| ConfigFile {
            chain: ChainSection {
                rpc_url: DEFAULT_RPC_URL.to_string(),
                contract,
                cast_binary: default_cast_binary(),
                confirmations: default_confirmations(),
            },
            wallet: WalletSection::default(),
            display: DisplaySection::default(),
            discovery: ProbePolicy::default(),
            claims: ClaimsSection::default(),
        });

        let mut accounts = file.wallet.accounts;
        let preferred = match (overrides.account, env_account) {
            (Some(raw), _) => Some(parse_address(raw, "--account")?),
            (None, Some(raw)) => Some(parse_address(&raw, ENV_ACCOUNT)?),
            (None, None) => None,
        };
        if let Some(account) = preferred {
            accounts.retain(|a| *a != account);
            accounts.insert(0, account);
        }

        let confirmation_timeout = match file.claims.confirmation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            cast: CastConfig {
                binary: file.chain.cast_binary,
                rpc_url,
                contract,
                confirmations: file.chain.confirmations,
            },
            accounts,
            signer: file.wallet.signer,
            display: file.display,
            session: SessionConfig {
                probe: file.discovery,
                claims: ClaimConfig {
                    confirmation_timeout,
                },
            },
        })
    }
}

fn parse_address(raw: &str, source: &str) -> Result<Address> {
    raw.parse()
        .with_context(|| format!("invalid address from {source}: {raw}"))
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
