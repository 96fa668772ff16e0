mod claim_cmd;
mod config;
mod context;
mod display;
mod plans_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;
mod tui;

use clap::{Parser, Subcommand};

use vestdash_core::model::Address;
use vestdash_core::store::ClaimRequest;
use vestdash_core::wallet::SigningMethod;

use config::{Overrides, VestdashConfig};
use context::AppContext;

#[derive(Parser)]
#[command(name = "vestdash", about = "Inspect and claim token release plans")]
struct Cli {
    /// JSON-RPC endpoint (overrides VESTDASH_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Release contract address (overrides VESTDASH_CONTRACT)
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Account to connect first (overrides VESTDASH_ACCOUNT)
    #[arg(long, global = true)]
    account: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a vestdash config file
    Init {
        /// Wallet account to manage (repeatable)
        #[arg(long = "wallet-account")]
        accounts: Vec<String>,
        /// Read the signing key from this environment variable instead of
        /// relying on an unlocked node account
        #[arg(long)]
        private_key_env: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the release plans of the connected account
    Plans,
    /// Claim a single release plan
    Claim {
        /// Plan index to claim
        index: u64,
    },
    /// Claim every eligible release plan
    ClaimAll,
    /// Launch interactive TUI dashboard
    Dashboard,
    /// Serve the session as a JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Execute the `vestdash init` command: write config file.
fn cmd_init(
    overrides: Overrides<'_>,
    accounts: &[String],
    private_key_env: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let resolved = VestdashConfig::resolve_with(None, overrides)?;
    let mut wallet_accounts = resolved.accounts;
    for raw in accounts {
        let account: Address = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid wallet account {raw}: {e}"))?;
        if !wallet_accounts.contains(&account) {
            wallet_accounts.push(account);
        }
    }

    let cfg = config::ConfigFile {
        chain: config::ChainSection {
            rpc_url: resolved.cast.rpc_url,
            contract: resolved.cast.contract,
            cast_binary: resolved.cast.binary,
            confirmations: resolved.cast.confirmations,
        },
        wallet: config::WalletSection {
            accounts: wallet_accounts,
            signer: match private_key_env {
                Some(var) => SigningMethod::PrivateKeyEnv { var },
                None => SigningMethod::Unlocked,
            },
        },
        display: config::DisplaySection::default(),
        discovery: Default::default(),
        claims: Default::default(),
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  chain.rpc_url = {}", cfg.chain.rpc_url);
    println!("  chain.contract = {}", cfg.chain.contract);
    println!("  wallet.accounts = {}", cfg.wallet.accounts.len());
    println!();
    println!("Next: run `vestdash plans` or `vestdash dashboard`.");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The dashboard owns the terminal; only log over it when asked to.
    let is_dashboard = matches!(cli.command, Commands::Dashboard);
    if !is_dashboard || std::env::var_os("RUST_LOG").is_some() {
        init_tracing();
    }

    let overrides = Overrides {
        rpc_url: cli.rpc_url.as_deref(),
        contract: cli.contract.as_deref(),
        account: cli.account.as_deref(),
    };

    match cli.command {
        Commands::Init {
            accounts,
            private_key_env,
            force,
        } => {
            cmd_init(overrides, &accounts, private_key_env, force)?;
        }
        Commands::Plans => {
            let resolved = VestdashConfig::resolve(overrides)?;
            plans_cmd::run_plans(AppContext::from_config(&resolved)).await?;
        }
        Commands::Claim { index } => {
            let resolved = VestdashConfig::resolve(overrides)?;
            let ctx = AppContext::from_config(&resolved);
            claim_cmd::run_claim(ctx, ClaimRequest::Index(index)).await?;
        }
        Commands::ClaimAll => {
            let resolved = VestdashConfig::resolve(overrides)?;
            let ctx = AppContext::from_config(&resolved);
            claim_cmd::run_claim(ctx, ClaimRequest::All).await?;
        }
        Commands::Dashboard => {
            let resolved = VestdashConfig::resolve(overrides)?;
            tui::run_dashboard(AppContext::from_config(&resolved)).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = VestdashConfig::resolve(overrides)?;
            let ctx = AppContext::from_config(&resolved);
            let state = serve_cmd::ServeState {
                session: ctx.session,
                display: ctx.display,
            };
            serve_cmd::run_serve(state, ctx.notices, &bind, port).await?;
        }
    }

    Ok(())
}
