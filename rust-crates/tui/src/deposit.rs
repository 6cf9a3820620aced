//! Deposit validation and the transfer intent handed to the wallet.
//!
//! Everything here runs before any network call: a request that fails
//! validation never reaches the wallet.

use serde::Serialize;
use std::fmt;

use crate::wallets::{
    WalletAdapter,
    WalletError,
};

pub const DEFAULT_DECIMALS: u8 = 6;

#[derive(Clone, Debug, PartialEq)]
pub enum DepositError {
    EmptyName,
    UnparsableAmount { input: String },
    InvalidAmount { amount: f64 },
    BelowSmallestUnit { amount: f64, decimals: u8 },
    DepositsClosed,
    NoWallet,
}

impl fmt::Display for DepositError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "enter a display name"),
            Self::UnparsableAmount { input } => write!(f, "{input:?} is not an amount"),
            Self::InvalidAmount { amount } => {
                write!(f, "deposit must be a positive amount, got {amount}")
            }
            Self::BelowSmallestUnit { amount, decimals } => write!(
                f,
                "{amount} is below the smallest unit of a {decimals}-decimal token"
            ),
            Self::DepositsClosed => write!(f, "deposits are closed for this round"),
            Self::NoWallet => write!(f, "connect a wallet with --wallet to deposit"),
        }
    }
}

impl std::error::Error for DepositError {}

#[derive(Clone, Debug, PartialEq)]
pub struct DepositRequest {
    pub name: String,
    pub amount: f64,
}

impl DepositRequest {
    pub fn parse(name: &str, amount: &str) -> Result<Self, DepositError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DepositError::EmptyName);
        }
        let amount = amount
            .trim()
            .parse::<f64>()
            .map_err(|_| DepositError::UnparsableAmount {
                input: amount.to_string(),
            })?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DepositError::InvalidAmount { amount });
        }
        Ok(Self {
            name: name.to_string(),
            amount,
        })
    }
}

/// Smallest-unit amount for `amount` tokens, rounded to the nearest unit.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, DepositError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DepositError::InvalidAmount { amount });
    }
    let scaled = (amount * 10f64.powi(i32::from(decimals))).round();
    if scaled < 1.0 {
        return Err(DepositError::BelowSmallestUnit { amount, decimals });
    }
    if scaled >= u64::MAX as f64 {
        return Err(DepositError::InvalidAmount { amount });
    }
    Ok(scaled as u64)
}

/// Where deposits go.
#[derive(Clone, Debug, PartialEq)]
pub struct DepositTarget {
    pub mint: String,
    pub treasury: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Instruction {
    CreateAssociatedAccount {
        payer: String,
        owner: String,
        mint: String,
    },
    TransferChecked {
        source_owner: String,
        destination_owner: String,
        mint: String,
        amount: u64,
        decimals: u8,
    },
    Memo {
        text: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    pub owner: String,
    pub mint: String,
    pub destination_owner: String,
    pub decimals: u8,
    pub instructions: Vec<Instruction>,
}

impl TransferIntent {
    pub fn amount(&self) -> Option<u64> {
        self.instructions.iter().find_map(|ix| match ix {
            Instruction::TransferChecked { amount, .. } => Some(*amount),
            _ => None,
        })
    }
}

pub fn build_transfer_intent(
    owner: &str,
    target: &DepositTarget,
    request: &DepositRequest,
    destination_exists: bool,
) -> Result<TransferIntent, DepositError> {
    let amount = to_base_units(request.amount, target.decimals)?;
    let mut instructions = Vec::with_capacity(3);
    if !destination_exists {
        instructions.push(Instruction::CreateAssociatedAccount {
            payer: owner.to_string(),
            owner: target.treasury.clone(),
            mint: target.mint.clone(),
        });
    }
    instructions.push(Instruction::TransferChecked {
        source_owner: owner.to_string(),
        destination_owner: target.treasury.clone(),
        mint: target.mint.clone(),
        amount,
        decimals: target.decimals,
    });
    instructions.push(Instruction::Memo {
        text: request.name.clone(),
    });
    Ok(TransferIntent {
        owner: owner.to_string(),
        mint: target.mint.clone(),
        destination_owner: target.treasury.clone(),
        decimals: target.decimals,
        instructions,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepositReceipt {
    pub signature: String,
    pub request: DepositRequest,
    pub wallet_address: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DepositFailure {
    Invalid(DepositError),
    Wallet(WalletError),
}

impl DepositFailure {
    pub fn is_rejection(&self) -> bool {
        matches!(self, DepositFailure::Wallet(err) if err.is_rejection())
    }
}

impl fmt::Display for DepositFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Wallet(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DepositFailure {}

impl From<DepositError> for DepositFailure {
    fn from(err: DepositError) -> Self {
        Self::Invalid(err)
    }
}

impl From<WalletError> for DepositFailure {
    fn from(err: WalletError) -> Self {
        Self::Wallet(err)
    }
}

/// Checks the destination account, builds the intent and asks the wallet to
/// sign and submit it.
pub async fn submit_deposit<W: WalletAdapter>(
    wallet: &W,
    target: &DepositTarget,
    request: DepositRequest,
) -> Result<DepositReceipt, DepositFailure> {
    // validate before touching the network
    to_base_units(request.amount, target.decimals)?;
    let owner = wallet.owner().to_string();
    let exists = wallet
        .destination_exists(&target.treasury, &target.mint)
        .await?;
    let intent = build_transfer_intent(&owner, target, &request, exists)?;
    tracing::info!(
        name = %request.name,
        amount = request.amount,
        create_account = !exists,
        "submitting deposit"
    );
    let signature = wallet.submit(&intent).await?;
    Ok(DepositReceipt {
        signature,
        request,
        wallet_address: owner,
    })
}
