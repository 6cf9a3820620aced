use chrono::TimeDelta;
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use next_rich::{
    deposit::{
        DEFAULT_DECIMALS,
        DepositTarget,
    },
    round_client::DEFAULT_API_URL,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const SIMULATED_MINT: &str = "SIMULATED";
const SIMULATED_TREASURY: &str = "simulated-treasury";
const LOCAL_PLAYER: &str = "local-player";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Deposit tokens and watch the roulette pick the next rich",
    long_about = None
)]
struct Args {
    /// Round API base URL
    #[arg(long, env = "NEXT_RICH_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Wallet bridge signing transfers for `--wallet`
    #[arg(long, env = "NEXT_RICH_WALLET_URL", default_value = "http://127.0.0.1:8787")]
    wallet_url: String,

    /// Public key of the depositing wallet
    #[arg(long, env = "NEXT_RICH_WALLET")]
    wallet: Option<String>,

    /// Mint of the deposited token
    #[arg(long, env = "NEXT_RICH_MINT")]
    mint: Option<String>,

    /// Owner of the prize pool token account
    #[arg(long, env = "NEXT_RICH_TREASURY")]
    treasury: Option<String>,

    #[arg(long, env = "NEXT_RICH_DECIMALS", default_value_t = DEFAULT_DECIMALS)]
    decimals: u8,

    #[arg(
        long,
        env = "NEXT_RICH_POLL_INTERVAL_SECS",
        default_value_t = client::DEFAULT_POLL_INTERVAL_SECS
    )]
    poll_interval_secs: u64,

    /// Play self-contained rounds without the round API
    #[arg(long)]
    simulate: bool,

    /// Simulated players depositing alongside you
    #[arg(long, default_value_t = 3)]
    bots: usize,

    #[arg(long, default_value_t = client::DEFAULT_ROUND_SECS)]
    round_secs: u64,

    #[arg(long, env = "NEXT_RICH_PREFS_FILE", default_value = "~/.next-rich/preferences.json")]
    prefs_file: String,

    #[arg(long, env = "NEXT_RICH_LOG_DIR", default_value = "~/.next-rich/logs")]
    log_dir: String,
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// The terminal belongs to the UI, so logs go to a daily file.
fn init_tracing(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "next-rich.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn app_config(args: Args) -> Result<client::AppConfig> {
    if args.poll_interval_secs == 0 {
        return Err(eyre!("--poll-interval-secs must be at least 1"));
    }
    if args.simulate {
        if args.round_secs == 0 {
            return Err(eyre!("--round-secs must be at least 1"));
        }
        let round_secs = i64::try_from(args.round_secs)
            .wrap_err("--round-secs is too large")?;
        return Ok(client::AppConfig {
            source: client::RoundSourceConfig::Simulated {
                round_duration: TimeDelta::seconds(round_secs),
                bots: args.bots,
            },
            wallet: client::WalletConfig::Local {
                owner: args.wallet.unwrap_or_else(|| LOCAL_PLAYER.to_string()),
            },
            deposit_target: DepositTarget {
                mint: args.mint.unwrap_or_else(|| SIMULATED_MINT.to_string()),
                treasury: args
                    .treasury
                    .unwrap_or_else(|| SIMULATED_TREASURY.to_string()),
                decimals: args.decimals,
            },
            prefs_path: expand_path(&args.prefs_file),
        });
    }

    let wallet = match &args.wallet {
        Some(owner) => {
            if args.mint.is_none() || args.treasury.is_none() {
                return Err(eyre!(
                    "--mint and --treasury are required to deposit with --wallet"
                ));
            }
            client::WalletConfig::Bridge {
                url: args.wallet_url.clone(),
                owner: owner.clone(),
            }
        }
        None => client::WalletConfig::Disconnected,
    };
    Ok(client::AppConfig {
        source: client::RoundSourceConfig::Server {
            api_url: args.api_url,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
        },
        wallet,
        deposit_target: DepositTarget {
            mint: args.mint.unwrap_or_default(),
            treasury: args.treasury.unwrap_or_default(),
            decimals: args.decimals,
        },
        prefs_path: expand_path(&args.prefs_file),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&expand_path(&args.log_dir))?;
    tracing::info!("starting next-rich client");
    let app_config = app_config(args)?;
    client::run_app(app_config).await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn app_config__simulate_uses_local_wallet() {
        // given
        let args = Args::parse_from(["next-rich", "--simulate", "--round-secs", "30"]);

        // when
        let config = app_config(args).unwrap();

        // then
        assert!(matches!(
            config.source,
            client::RoundSourceConfig::Simulated { bots: 3, .. }
        ));
        assert!(matches!(
            config.wallet,
            client::WalletConfig::Local { ref owner } if owner == LOCAL_PLAYER
        ));
        assert_eq!(config.deposit_target.decimals, DEFAULT_DECIMALS);
    }

    #[test]
    fn app_config__wallet_requires_mint_and_treasury() {
        let args = Args::parse_from(["next-rich", "--wallet", "OWNER", "--mint", "MINT"]);

        let err = app_config(args).unwrap_err();

        assert!(err.to_string().contains("--treasury"));
    }

    #[test]
    fn app_config__server_without_wallet_is_read_only() {
        let args = Args::parse_from(["next-rich", "--api-url", "http://localhost:9000"]);

        let config = app_config(args).unwrap();

        assert!(matches!(config.wallet, client::WalletConfig::Disconnected));
        assert!(matches!(
            config.source,
            client::RoundSourceConfig::Server { ref api_url, .. } if api_url == "http://localhost:9000"
        ));
    }
}
