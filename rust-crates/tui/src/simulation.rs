//! Self-contained rounds for playing without a round server.
//!
//! Each round accepts deposits until its end time; the spin machine draws the
//! winner locally and a fresh round starts once the reveal is over.

use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use rand::Rng;
use wheel::{
    Participant,
    Round,
    RoundId,
    RoundStatus,
};

/// Seconds between bot deposits, drawn uniformly.
const BOT_DELAY_SECS: (i64, i64) = (4, 15);
const BOT_DEPOSIT_RANGE: (u32, u32) = (1, 50);

#[derive(Clone, Debug)]
struct Bot {
    name: String,
    wallet_address: String,
}

#[derive(Debug)]
pub struct SimulatedRounds {
    round_duration: TimeDelta,
    deposit_cutoff: TimeDelta,
    sequence: u64,
    round: Round,
    bots: Vec<Bot>,
    next_bot_deposit: Option<DateTime<Utc>>,
}

impl SimulatedRounds {
    pub fn new(
        round_duration: TimeDelta,
        deposit_cutoff: TimeDelta,
        bot_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let bots = (0..bot_count)
            .map(|i| {
                let name = fakeit::name::first();
                Bot {
                    wallet_address: format!("bot{i}-{}", name.to_lowercase()),
                    name,
                }
            })
            .collect();
        let mut rounds = Self {
            round_duration,
            deposit_cutoff,
            sequence: 0,
            round: empty_round(RoundId::new("sim-0"), now + round_duration),
            bots,
            next_bot_deposit: None,
        };
        rounds.start_next_round(now);
        rounds
    }

    /// Current round as a server would report it at `now`.
    pub fn current(&self, now: DateTime<Utc>) -> Round {
        let mut round = self.round.clone();
        if round.status == RoundStatus::Active && now >= round.end_time {
            round.status = RoundStatus::Waiting;
        }
        round
    }

    pub fn round_id(&self) -> &RoundId {
        &self.round.id
    }

    /// Nobody deposited before the end time, so there is nothing to draw.
    pub fn expired_without_deposits(&self, now: DateTime<Utc>) -> bool {
        self.round.participants.is_empty() && now >= self.round.end_time
    }

    pub fn deposit(&mut self, identity: &str, amount: f64, wallet_address: &str) {
        Participant::accumulate(&mut self.round.participants, identity, amount, wallet_address);
        self.round.prize_amount += amount;
    }

    pub fn mark_resolved(&mut self, winner: &str) {
        self.round.status = RoundStatus::Resolved;
        self.round.winner_identity = Some(winner.to_string());
    }

    pub fn start_next_round(&mut self, now: DateTime<Utc>) -> Round {
        self.sequence += 1;
        self.round = empty_round(
            RoundId::new(format!("sim-{}", self.sequence)),
            now + self.round_duration,
        );
        self.next_bot_deposit = None;
        tracing::info!(round_id = %self.round.id, "simulated round started");
        self.round.clone()
    }

    /// Lets one bot deposit when its turn has come. Returns whether the
    /// round changed.
    pub fn bot_tick<R: Rng>(&mut self, rng: &mut R, now: DateTime<Utc>) -> bool {
        if self.bots.is_empty() || now + self.deposit_cutoff >= self.round.end_time {
            return false;
        }
        let Some(due) = self.next_bot_deposit else {
            self.next_bot_deposit = Some(now + bot_delay(rng));
            return false;
        };
        if now < due {
            return false;
        }
        self.next_bot_deposit = Some(now + bot_delay(rng));
        let bot = self.bots[rng.random_range(0..self.bots.len())].clone();
        let amount = f64::from(rng.random_range(BOT_DEPOSIT_RANGE.0..=BOT_DEPOSIT_RANGE.1));
        tracing::debug!(bot = %bot.name, amount, "bot deposit");
        self.deposit(&bot.name, amount, &bot.wallet_address);
        true
    }
}

fn empty_round(id: RoundId, end_time: DateTime<Utc>) -> Round {
    Round {
        id,
        status: RoundStatus::Active,
        end_time,
        participants: Vec::new(),
        prize_amount: 0.0,
        winner_identity: None,
    }
}

fn bot_delay<R: Rng>(rng: &mut R) -> TimeDelta {
    TimeDelta::seconds(rng.random_range(BOT_DELAY_SECS.0..=BOT_DELAY_SECS.1))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use chrono::TimeZone;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn deposit__accumulates_per_identity_and_grows_prize() {
        // given
        let mut rounds = SimulatedRounds::new(
            TimeDelta::seconds(120),
            TimeDelta::seconds(10),
            0,
            t0(),
        );

        // when
        rounds.deposit("alice", 2.0, "A");
        rounds.deposit("bob", 1.0, "B");
        rounds.deposit("alice", 0.5, "A");

        // then
        let round = rounds.current(t0());
        assert_eq!(
            round.participants,
            vec![
                Participant::new("alice", 2.5, "A"),
                Participant::new("bob", 1.0, "B"),
            ]
        );
        assert_eq!(round.prize_amount, 3.5);
        assert_eq!(round.status, RoundStatus::Active);
    }

    #[test]
    fn current__reports_waiting_after_end_time() {
        let rounds = SimulatedRounds::new(
            TimeDelta::seconds(30),
            TimeDelta::seconds(10),
            0,
            t0(),
        );

        let round = rounds.current(t0() + TimeDelta::seconds(30));

        assert_eq!(round.status, RoundStatus::Waiting);
    }

    #[test]
    fn expired_without_deposits__only_for_empty_rounds_past_end() {
        // given
        let mut rounds = SimulatedRounds::new(
            TimeDelta::seconds(30),
            TimeDelta::seconds(10),
            0,
            t0(),
        );
        let end = t0() + TimeDelta::seconds(30);

        // then
        assert!(!rounds.expired_without_deposits(t0()));
        assert!(rounds.expired_without_deposits(end));
        rounds.deposit("alice", 1.0, "A");
        assert!(!rounds.expired_without_deposits(end));
    }

    #[test]
    fn start_next_round__resets_participants_with_new_id() {
        // given
        let mut rounds = SimulatedRounds::new(
            TimeDelta::seconds(30),
            TimeDelta::seconds(10),
            0,
            t0(),
        );
        rounds.deposit("alice", 2.0, "A");
        let first = rounds.round_id().clone();

        // when
        let next = rounds.start_next_round(t0() + TimeDelta::seconds(45));

        // then
        assert_ne!(next.id, first);
        assert!(next.participants.is_empty());
        assert_eq!(next.end_time, t0() + TimeDelta::seconds(75));
    }

    #[test]
    fn bot_tick__deposits_only_before_cutoff() {
        // given
        let mut rng = StdRng::seed_from_u64(11);
        let mut rounds = SimulatedRounds::new(
            TimeDelta::seconds(120),
            TimeDelta::seconds(10),
            3,
            t0(),
        );

        // when
        let mut deposits = 0;
        for second in 0..130 {
            if rounds.bot_tick(&mut rng, t0() + TimeDelta::seconds(second)) {
                deposits += 1;
            }
        }

        // then
        assert!(deposits > 0);
        let total: f64 = rounds
            .current(t0())
            .participants
            .iter()
            .map(|p| p.deposit_total)
            .sum();
        assert!(total >= deposits as f64);
        let late = rounds.bot_tick(&mut rng, t0() + TimeDelta::seconds(111));
        assert!(!late);
    }
}
