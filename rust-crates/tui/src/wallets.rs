use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::Deserialize;
use std::{
    fmt,
    future::Future,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

use crate::deposit::TransferIntent;

/// Error code wallets use when the user declines to sign.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Clone, Debug, PartialEq)]
pub enum WalletError {
    /// The user declined to sign. Not a failure of the system.
    Rejected { message: String },
    Failed { message: String },
}

impl WalletError {
    pub fn classify(code: Option<i64>, message: impl Into<String>) -> Self {
        let message = message.into();
        let rejected = code == Some(USER_REJECTED_CODE)
            || message.to_lowercase().contains("user rejected");
        if rejected {
            WalletError::Rejected { message }
        } else {
            WalletError::Failed { message }
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, WalletError::Rejected { .. })
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { .. } => write!(f, "transaction cancelled in wallet"),
            Self::Failed { message } => write!(f, "wallet request failed: {message}"),
        }
    }
}

impl std::error::Error for WalletError {}

/// Signs and submits transfers on behalf of a connected owner.
pub trait WalletAdapter {
    fn owner(&self) -> &str;

    fn destination_exists(
        &self,
        owner: &str,
        mint: &str,
    ) -> impl Future<Output = Result<bool, WalletError>> + Send;

    /// Returns the transaction signature.
    fn submit(
        &self,
        intent: &TransferIntent,
    ) -> impl Future<Output = Result<String, WalletError>> + Send;
}

/// Talks to a local wallet bridge over HTTP.
#[derive(Clone)]
pub struct HttpWalletBridge {
    base_url: String,
    owner: String,
    http: reqwest::Client,
}

impl HttpWalletBridge {
    pub fn new(base_url: impl Into<String>, owner: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for wallet bridge")?;
        Ok(Self {
            base_url,
            owner: owner.into(),
            http,
        })
    }
}

#[derive(Deserialize)]
struct TokenAccountDto {
    exists: bool,
}

#[derive(Deserialize)]
struct SubmitResponseDto {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    error: Option<BridgeErrorDto>,
}

#[derive(Deserialize)]
struct BridgeErrorDto {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

fn transport_error(err: reqwest::Error) -> WalletError {
    WalletError::Failed {
        message: err.to_string(),
    }
}

impl WalletAdapter for HttpWalletBridge {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn destination_exists(&self, owner: &str, mint: &str) -> Result<bool, WalletError> {
        let url = format!("{}/token-accounts/{}", self.base_url, owner);
        let res = self
            .http
            .get(url)
            .query(&[("mint", mint)])
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status();
        if !status.is_success() {
            return Err(WalletError::Failed {
                message: format!("wallet bridge responded with {status} for token account"),
            });
        }
        let dto: TokenAccountDto = res.json().await.map_err(transport_error)?;
        Ok(dto.exists)
    }

    async fn submit(&self, intent: &TransferIntent) -> Result<String, WalletError> {
        let url = format!("{}/transactions", self.base_url);
        let res = self
            .http
            .post(url)
            .json(intent)
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(transport_error)?;
        let dto: SubmitResponseDto =
            serde_json::from_slice(&bytes).map_err(|err| WalletError::Failed {
                message: format!(
                    "wallet bridge responded with {status}: {err}: {}",
                    String::from_utf8_lossy(&bytes)
                ),
            })?;
        match (dto.signature, dto.error) {
            (_, Some(error)) => Err(WalletError::classify(error.code, error.message)),
            (Some(signature), None) if status.is_success() => Ok(signature),
            _ => Err(WalletError::Failed {
                message: format!("wallet bridge responded with {status} and no signature"),
            }),
        }
    }
}

/// Accepts every transfer without leaving the process. Used with simulated
/// rounds.
#[derive(Debug, Default)]
pub struct LocalWallet {
    owner: String,
    submitted: AtomicU64,
}

impl LocalWallet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            submitted: AtomicU64::new(0),
        }
    }
}

impl WalletAdapter for LocalWallet {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn destination_exists(&self, _owner: &str, _mint: &str) -> Result<bool, WalletError> {
        Ok(true)
    }

    async fn submit(&self, intent: &TransferIntent) -> Result<String, WalletError> {
        let n = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("local-{}-{n}", intent.owner))
    }
}

/// The wallet the app was started with.
pub enum Wallet {
    Bridge(HttpWalletBridge),
    Local(LocalWallet),
}

impl WalletAdapter for Wallet {
    fn owner(&self) -> &str {
        match self {
            Wallet::Bridge(bridge) => bridge.owner(),
            Wallet::Local(local) => local.owner(),
        }
    }

    async fn destination_exists(&self, owner: &str, mint: &str) -> Result<bool, WalletError> {
        match self {
            Wallet::Bridge(bridge) => bridge.destination_exists(owner, mint).await,
            Wallet::Local(local) => local.destination_exists(owner, mint).await,
        }
    }

    async fn submit(&self, intent: &TransferIntent) -> Result<String, WalletError> {
        match self {
            Wallet::Bridge(bridge) => bridge.submit(intent).await,
            Wallet::Local(local) => local.submit(intent).await,
        }
    }
}
