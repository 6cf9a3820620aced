use std::fmt;

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::Deserialize;
use wheel::{
    Participant,
    Round,
    RoundId,
    RoundStatus,
    WinnerRecord,
};

pub const DEFAULT_API_URL: &str = "https://api.thenextrich.xyz";

#[derive(Clone)]
pub struct RoundClient {
    base_url: String,
    http: reqwest::Client,
}

/// Outcome the server declared for a finished round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundResult {
    pub winner_wallet: String,
    pub prize_amount: f64,
    pub resolved_at: DateTime<Utc>,
}

impl RoundClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for round API")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `Ok(None)` when the server has no active round.
    pub async fn active_round(&self) -> Result<Option<Round>> {
        let url = format!("{}/rounds/active", self.base_url);
        let Some(bytes) = self.get_optional(&url, "active round").await? else {
            return Ok(None);
        };
        let dto: ActiveRoundDto =
            serde_json::from_slice(&bytes).wrap_err("invalid active round payload")?;
        Round::try_from(dto).map(Some)
    }

    pub async fn winners(&self) -> Result<Vec<WinnerRecord>> {
        let url = format!("{}/rounds/winners", self.base_url);
        let Some(bytes) = self.get_optional(&url, "winners").await? else {
            return Ok(Vec::new());
        };
        let dto: WinnersDto =
            serde_json::from_slice(&bytes).wrap_err("invalid winners payload")?;
        dto.into_winners()
            .into_iter()
            .map(WinnerRecord::try_from)
            .collect()
    }

    /// `Ok(None)` while the round has no published result yet.
    pub async fn round_result(&self, round_id: &RoundId) -> Result<Option<RoundResult>> {
        let url = format!("{}/rounds/{}/result", self.base_url, round_id);
        let Some(bytes) = self.get_optional(&url, "round result").await? else {
            return Ok(None);
        };
        let dto: WinnerDto =
            serde_json::from_slice(&bytes).wrap_err("invalid round result payload")?;
        RoundResult::try_from(dto).map(Some)
    }

    async fn get_optional(&self, url: &str, what: &str) -> Result<Option<Vec<u8>>> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err("round API request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read round API response body")?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!(
                "round API responded with {status} when fetching {what}: {body}"
            ));
        }
        Ok(Some(bytes.to_vec()))
    }
}

impl fmt::Display for RoundClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveRoundDto {
    id: IdDto,
    status: RoundStatusDto,
    end_time: DateTime<Utc>,
    #[serde(default)]
    prize: AmountDto,
    #[serde(default)]
    participants: Vec<ParticipantDto>,
    #[serde(default)]
    winner_public_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDto {
    name: String,
    deposit: AmountDto,
    player_public_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinnerDto {
    winner_public_key: String,
    #[serde(default)]
    prize: AmountDto,
    end_time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WinnersDto {
    Wrapped { winners: Vec<WinnerDto> },
    Bare(Vec<WinnerDto>),
}

impl WinnersDto {
    fn into_winners(self) -> Vec<WinnerDto> {
        match self {
            WinnersDto::Wrapped { winners } | WinnersDto::Bare(winners) => winners,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdDto {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RoundStatusDto {
    Active,
    Waiting,
    Resolved,
}

/// Token amounts arrive as decimal strings, occasionally as plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountDto {
    Number(f64),
    Text(String),
}

impl Default for AmountDto {
    fn default() -> Self {
        AmountDto::Number(0.0)
    }
}

impl AmountDto {
    fn value(&self, field: &str) -> Result<f64> {
        let value = match self {
            AmountDto::Number(n) => *n,
            AmountDto::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .wrap_err_with(|| format!("{field} is not a number: {raw:?}"))?,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(eyre!("{field} must be a non-negative amount, got {value}"));
        }
        Ok(value)
    }
}

impl From<IdDto> for RoundId {
    fn from(value: IdDto) -> Self {
        match value {
            IdDto::Number(n) => RoundId::new(n.to_string()),
            IdDto::Text(s) => RoundId::new(s),
        }
    }
}

impl From<RoundStatusDto> for RoundStatus {
    fn from(value: RoundStatusDto) -> Self {
        match value {
            RoundStatusDto::Active => RoundStatus::Active,
            RoundStatusDto::Waiting => RoundStatus::Waiting,
            RoundStatusDto::Resolved => RoundStatus::Resolved,
        }
    }
}

impl TryFrom<ActiveRoundDto> for Round {
    type Error = color_eyre::Report;

    fn try_from(dto: ActiveRoundDto) -> Result<Self> {
        let mut participants: Vec<Participant> = Vec::with_capacity(dto.participants.len());
        for p in dto.participants {
            let deposit = p.deposit.value("participant deposit")?;
            Participant::accumulate(&mut participants, &p.name, deposit, &p.player_public_key);
        }
        let round = Round {
            id: dto.id.into(),
            status: dto.status.into(),
            end_time: dto.end_time,
            prize_amount: dto.prize.value("prize")?,
            winner_identity: None,
            participants,
        };
        // an undeclared key stays as-is so that the spin surfaces the mismatch
        let winner_identity = dto.winner_public_key.map(|key| {
            round
                .identity_for_wallet(&key)
                .map(str::to_string)
                .unwrap_or(key)
        });
        Ok(Round {
            winner_identity,
            ..round
        })
    }
}

impl TryFrom<WinnerDto> for RoundResult {
    type Error = color_eyre::Report;

    fn try_from(dto: WinnerDto) -> Result<Self> {
        Ok(RoundResult {
            prize_amount: dto.prize.value("prize")?,
            winner_wallet: dto.winner_public_key,
            resolved_at: dto.end_time,
        })
    }
}

impl TryFrom<WinnerDto> for WinnerRecord {
    type Error = color_eyre::Report;

    fn try_from(dto: WinnerDto) -> Result<Self> {
        Ok(WinnerRecord {
            prize_amount: dto.prize.value("prize")?,
            identity: dto.winner_public_key.clone(),
            wallet_address: dto.winner_public_key,
            resolved_at: dto.end_time,
        })
    }
}
