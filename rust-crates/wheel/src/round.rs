use chrono::{
    DateTime,
    Utc,
};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub String);

impl RoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// Accepting deposits until `end_time`.
    Active,
    /// Deposits closed, winner not yet published.
    Waiting,
    Resolved,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    pub identity: String,
    pub deposit_total: f64,
    pub wallet_address: String,
}

impl Participant {
    pub fn new(
        identity: impl Into<String>,
        deposit_total: f64,
        wallet_address: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            deposit_total,
            wallet_address: wallet_address.into(),
        }
    }

    /// Adds `amount` to the entry owned by `identity`, appending a new
    /// participant at the end when the identity has not deposited yet.
    pub fn accumulate(
        participants: &mut Vec<Participant>,
        identity: &str,
        amount: f64,
        wallet_address: &str,
    ) {
        if let Some(existing) = participants
            .iter_mut()
            .find(|p| p.identity == identity)
        {
            existing.deposit_total += amount;
        } else {
            participants.push(Participant::new(identity, amount, wallet_address));
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Round {
    pub id: RoundId,
    pub status: RoundStatus,
    pub end_time: DateTime<Utc>,
    pub participants: Vec<Participant>,
    pub prize_amount: f64,
    pub winner_identity: Option<String>,
}

impl Round {
    pub fn identity_for_wallet(&self, wallet_address: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.wallet_address == wallet_address)
            .map(|p| p.identity.as_str())
    }

    pub fn wallet_for_identity(&self, identity: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.identity == identity)
            .map(|p| p.wallet_address.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WinnerRecord {
    pub identity: String,
    pub wallet_address: String,
    pub prize_amount: f64,
    pub resolved_at: DateTime<Utc>,
}
