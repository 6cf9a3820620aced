//! Round lifecycle of the wheel: countdown, spin, reveal, reset.
//!
//! The machine never reads the clock. Every transition takes `now`, so the
//! owner decides how often to `tick` and tests can drive time directly.
//!
//! ```text
//! Idle ──participants──▶ Countdown ──trigger──▶ Spinning ──spin_duration──▶ Revealed
//!  ▲                        ▲   ▲                  │ (resolution failed)        │
//!  │                        │   └──────────────────┘                           │
//!  └────────────────────────┴──────────────── reveal_duration ─────────────────┘
//! ```

use crate::{
    random::RandomSource,
    resolver::{
        ResolveError,
        resolve_angle_by_identity,
        resolve_by_weighted_draw,
        spin_rotation,
    },
    round::{
        Participant,
        Round,
        RoundId,
        RoundStatus,
        WinnerRecord,
    },
    segments::{
        FULL_TURN,
        Segment,
        compute_segments,
    },
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use std::fmt;
use tracing::{
    debug,
    info,
};

pub const SPIN_DURATION_SECS: i64 = 6;
pub const REVEAL_DURATION_SECS: i64 = 5;
pub const DEPOSIT_CUTOFF_SECS: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinPhase {
    Idle,
    Countdown,
    Spinning,
    Revealed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinTriggers {
    /// Spin when the local countdown reaches the round's end time.
    pub countdown: bool,
    /// Spin when the round source reports [`RoundStatus::Waiting`].
    pub server_status: bool,
}

#[derive(Clone, Debug)]
pub struct SpinConfig {
    pub spin_duration: TimeDelta,
    pub reveal_duration: TimeDelta,
    pub deposit_cutoff: TimeDelta,
    pub triggers: SpinTriggers,
    /// Empty the wheel once the reveal ends instead of waiting for the round
    /// source to report the next round.
    pub clear_on_reveal: bool,
}

impl SpinConfig {
    /// Round state and winners come from the server; participants are
    /// replaced by the next poll.
    pub fn server() -> Self {
        Self {
            spin_duration: TimeDelta::seconds(SPIN_DURATION_SECS),
            reveal_duration: TimeDelta::seconds(REVEAL_DURATION_SECS),
            deposit_cutoff: TimeDelta::seconds(DEPOSIT_CUTOFF_SECS),
            triggers: SpinTriggers {
                countdown: false,
                server_status: true,
            },
            clear_on_reveal: false,
        }
    }

    /// Self-contained rounds: the local countdown decides when to spin and
    /// the wheel is cleared explicitly after each reveal.
    pub fn simulated(deposit_cutoff: TimeDelta) -> Self {
        Self {
            spin_duration: TimeDelta::seconds(SPIN_DURATION_SECS),
            reveal_duration: TimeDelta::seconds(REVEAL_DURATION_SECS),
            deposit_cutoff,
            triggers: SpinTriggers {
                countdown: true,
                server_status: false,
            },
            clear_on_reveal: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinTrigger {
    CountdownElapsed,
    RoundWaiting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinRequest {
    pub round_id: RoundId,
    pub trigger: SpinTrigger,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpinOutcome {
    pub winner: String,
    pub winner_address: String,
    pub token_angle: f64,
    pub prize_amount: f64,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpinEvent {
    /// The owner must resolve a winner and call one of the `begin_spin_*`
    /// methods, or [`SpinMachine::abort_spin`] on failure.
    SpinRequested(SpinRequest),
    Revealed(WinnerRecord),
    /// Celebration over; `cleared` tells whether the wheel was emptied.
    Settled { round_id: RoundId, cleared: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpinError {
    /// No resolution is pending for this round.
    NotRequested { round_id: RoundId },
    Resolve(ResolveError),
}

impl fmt::Display for SpinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequested { round_id } => {
                write!(f, "no spin pending for round {round_id}")
            }
            Self::Resolve(err) => write!(f, "unable to resolve winner: {err}"),
        }
    }
}

impl std::error::Error for SpinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve(err) => Some(err),
            Self::NotRequested { .. } => None,
        }
    }
}

impl From<ResolveError> for SpinError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpinSnapshot {
    pub phase: SpinPhase,
    pub round_id: Option<RoundId>,
    pub status: Option<RoundStatus>,
    pub participants: Vec<Participant>,
    pub segments: Vec<Segment>,
    /// Eased rotation to draw right now.
    pub rotation: f64,
    /// Rotation the wheel settles on once the animation ends.
    pub target_rotation: f64,
    /// Whole seconds until the round ends; `None` without a round.
    pub countdown: Option<TimeDelta>,
    pub prize_amount: f64,
    pub winner: Option<WinnerRecord>,
    pub deposits_open: bool,
}

#[derive(Clone, Debug)]
struct Animation {
    from: f64,
    to: f64,
    started_at: DateTime<Utc>,
    record: WinnerRecord,
}

#[derive(Clone, Debug)]
struct Reveal {
    record: WinnerRecord,
    until: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SpinMachine {
    config: SpinConfig,
    phase: SpinPhase,
    round: Option<Round>,
    segments: Vec<Segment>,
    /// Latest round observed while an animation or reveal was on screen.
    deferred: Option<Option<Round>>,
    spun_round: Option<RoundId>,
    in_flight: Option<RoundId>,
    countdown_fired: Option<RoundId>,
    rotation: f64,
    animation: Option<Animation>,
    reveal: Option<Reveal>,
}

impl SpinMachine {
    pub fn new(config: SpinConfig) -> Self {
        Self {
            config,
            phase: SpinPhase::Idle,
            round: None,
            segments: Vec::new(),
            deferred: None,
            spun_round: None,
            in_flight: None,
            countdown_fired: None,
            rotation: 0.0,
            animation: None,
            reveal: None,
        }
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Settled cumulative rotation in degrees. Never decreases.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn config(&self) -> &SpinConfig {
        &self.config
    }

    pub fn is_spinning(&self) -> bool {
        self.phase == SpinPhase::Spinning
    }

    /// Mirrors the round declared by the round source. While the wheel is
    /// spinning or showing a winner the round is held back and applied when
    /// the reveal ends.
    pub fn observe_round(
        &mut self,
        round: Option<Round>,
        now: DateTime<Utc>,
    ) -> Vec<SpinEvent> {
        if matches!(self.phase, SpinPhase::Spinning | SpinPhase::Revealed) {
            self.deferred = Some(round);
            return Vec::new();
        }
        let mut events = self.apply_round(round);
        events.extend(self.countdown_elapsed(now));
        events
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SpinEvent> {
        let mut events = Vec::new();

        if self.phase == SpinPhase::Spinning
            && let Some(animation) = &self.animation
        {
            let reveal_at = animation.started_at + self.config.spin_duration;
            if now >= reveal_at {
                let record = animation.record.clone();
                info!(winner = %record.identity, "revealing winner");
                self.phase = SpinPhase::Revealed;
                self.reveal = Some(Reveal {
                    record: record.clone(),
                    until: reveal_at + self.config.reveal_duration,
                });
                events.push(SpinEvent::Revealed(record));
            }
        }

        if self.phase == SpinPhase::Revealed
            && let Some(reveal) = &self.reveal
            && now >= reveal.until
        {
            events.extend(self.settle());
        }

        events.extend(self.countdown_elapsed(now));
        events
    }

    /// Starts the animation towards an already resolved outcome.
    pub fn begin_spin(
        &mut self,
        round_id: &RoundId,
        outcome: SpinOutcome,
        now: DateTime<Utc>,
    ) -> Result<f64, SpinError> {
        self.ensure_requested(round_id)?;
        Ok(self.start_animation(outcome, now))
    }

    /// Resolves the winner by identity on the wheel being spun and starts the
    /// animation. A winner missing from the wheel aborts the spin.
    pub fn begin_spin_for_winner(
        &mut self,
        round_id: &RoundId,
        identity: &str,
        prize_amount: f64,
        resolved_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<f64, SpinError> {
        self.ensure_requested(round_id)?;
        let resolved = resolve_angle_by_identity(&self.segments, identity).map(|angle| {
            let address = self
                .segments
                .iter()
                .find(|s| s.owner == identity)
                .map(|s| s.owner_address.clone())
                .unwrap_or_default();
            (angle, address)
        });
        match resolved {
            Ok((token_angle, winner_address)) => Ok(self.start_animation(
                SpinOutcome {
                    winner: identity.to_string(),
                    winner_address,
                    token_angle,
                    prize_amount,
                    resolved_at,
                },
                now,
            )),
            Err(err) => {
                self.abort_spin(round_id);
                Err(err.into())
            }
        }
    }

    /// Draws the winner locally with a weighted ticket and starts the
    /// animation.
    pub fn begin_spin_with_draw<R: RandomSource>(
        &mut self,
        round_id: &RoundId,
        random: &mut R,
        now: DateTime<Utc>,
    ) -> Result<SpinOutcome, SpinError> {
        self.ensure_requested(round_id)?;
        match resolve_by_weighted_draw(&self.segments, random) {
            Ok(draw) => {
                debug!(ticket = draw.ticket, winner = %draw.winner, "ticket drawn");
                let outcome = SpinOutcome {
                    winner: draw.winner,
                    winner_address: draw.winner_address,
                    token_angle: draw.token_angle,
                    prize_amount: self.prize_amount(),
                    resolved_at: now,
                };
                self.start_animation(outcome.clone(), now);
                Ok(outcome)
            }
            Err(err) => {
                self.abort_spin(round_id);
                Err(err.into())
            }
        }
    }

    /// Gives up on a pending resolution. The wheel returns to its countdown
    /// (or idle) state and a later trigger may request the spin again.
    pub fn abort_spin(&mut self, round_id: &RoundId) -> bool {
        if self.in_flight.as_ref() != Some(round_id) {
            return false;
        }
        info!(%round_id, "spin aborted");
        self.in_flight = None;
        // the next observed round replaces anything held back meanwhile
        self.deferred = None;
        self.phase = self.resting_phase();
        true
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SpinSnapshot {
        let countdown = self.round.as_ref().map(|round| {
            TimeDelta::seconds((round.end_time - now).num_seconds().max(0))
        });
        let winner = self.reveal.as_ref().map(|r| r.record.clone());

        SpinSnapshot {
            phase: self.phase,
            round_id: self.round.as_ref().map(|r| r.id.clone()),
            status: self.round.as_ref().map(|r| r.status),
            participants: self
                .round
                .as_ref()
                .map(|r| r.participants.clone())
                .unwrap_or_default(),
            segments: self.segments.clone(),
            rotation: self.displayed_rotation(now),
            target_rotation: self.rotation,
            countdown,
            prize_amount: self.prize_amount(),
            winner,
            deposits_open: self.deposits_open(now),
        }
    }

    /// Deposits are accepted while the round is active, more than the cutoff
    /// remains on the countdown and the wheel is at rest.
    pub fn deposits_open(&self, now: DateTime<Utc>) -> bool {
        let Some(round) = &self.round else {
            return false;
        };
        let remaining = TimeDelta::seconds((round.end_time - now).num_seconds().max(0));
        matches!(self.phase, SpinPhase::Idle | SpinPhase::Countdown)
            && round.status == RoundStatus::Active
            && remaining > self.config.deposit_cutoff
    }

    fn displayed_rotation(&self, now: DateTime<Utc>) -> f64 {
        let Some(animation) = &self.animation else {
            return self.rotation;
        };
        let total = self.config.spin_duration.num_milliseconds().max(1) as f64;
        let elapsed = (now - animation.started_at).num_milliseconds() as f64;
        let progress = (elapsed / total).clamp(0.0, 1.0);
        animation.from + (animation.to - animation.from) * ease_out_cubic(progress)
    }

    fn prize_amount(&self) -> f64 {
        self.round.as_ref().map(|r| r.prize_amount).unwrap_or(0.0)
    }

    fn ensure_requested(&self, round_id: &RoundId) -> Result<(), SpinError> {
        if self.in_flight.as_ref() == Some(round_id) {
            Ok(())
        } else {
            Err(SpinError::NotRequested {
                round_id: round_id.clone(),
            })
        }
    }

    fn start_animation(&mut self, outcome: SpinOutcome, now: DateTime<Utc>) -> f64 {
        let round_id = self.in_flight.take();
        self.spun_round = round_id;
        let from = self.rotation;
        let to = from + spin_rotation(outcome.token_angle, from);
        info!(
            winner = %outcome.winner,
            token_angle = outcome.token_angle,
            from,
            to,
            "spinning"
        );
        self.rotation = to;
        self.animation = Some(Animation {
            from,
            to,
            started_at: now,
            record: WinnerRecord {
                identity: outcome.winner,
                wallet_address: outcome.winner_address,
                prize_amount: outcome.prize_amount,
                resolved_at: outcome.resolved_at,
            },
        });
        self.phase = SpinPhase::Spinning;
        to
    }

    fn request_spin(&mut self, trigger: SpinTrigger) -> Option<SpinEvent> {
        if self.phase != SpinPhase::Countdown || self.in_flight.is_some() {
            return None;
        }
        let round = self.round.as_ref()?;
        if self.segments.is_empty() || self.spun_round.as_ref() == Some(&round.id) {
            return None;
        }
        info!(round_id = %round.id, ?trigger, "spin requested");
        self.in_flight = Some(round.id.clone());
        self.phase = SpinPhase::Spinning;
        Some(SpinEvent::SpinRequested(SpinRequest {
            round_id: round.id.clone(),
            trigger,
        }))
    }

    /// Fires at most once per round, even if the spin it requests is later
    /// aborted.
    fn countdown_elapsed(&mut self, now: DateTime<Utc>) -> Option<SpinEvent> {
        let round = self.round.as_ref()?;
        if self.phase != SpinPhase::Countdown
            || !self.config.triggers.countdown
            || now < round.end_time
            || self.countdown_fired.as_ref() == Some(&round.id)
        {
            return None;
        }
        self.countdown_fired = Some(round.id.clone());
        self.request_spin(SpinTrigger::CountdownElapsed)
    }

    fn settle(&mut self) -> Vec<SpinEvent> {
        self.reveal = None;
        self.animation = None;
        let round_id = self
            .spun_round
            .clone()
            .or_else(|| self.round.as_ref().map(|r| r.id.clone()))
            .unwrap_or_else(|| RoundId::new(""));
        let cleared = self.config.clear_on_reveal;
        if cleared && let Some(round) = self.round.as_mut() {
            round.participants.clear();
            round.prize_amount = 0.0;
            self.segments.clear();
        }
        self.phase = self.resting_phase();
        debug!(%round_id, cleared, "reveal over");
        let mut events = vec![SpinEvent::Settled { round_id, cleared }];
        if let Some(deferred) = self.deferred.take() {
            events.extend(self.apply_round(deferred));
        }
        events
    }

    fn apply_round(&mut self, round: Option<Round>) -> Vec<SpinEvent> {
        let Some(round) = round else {
            if self.round.take().is_some() {
                debug!("round source reports no active round");
            }
            self.segments.clear();
            self.phase = SpinPhase::Idle;
            return Vec::new();
        };

        let is_new_round = self.round.as_ref().map(|r| &r.id) != Some(&round.id);
        if is_new_round {
            info!(round_id = %round.id, "new round");
            self.spun_round = None;
            self.countdown_fired = None;
            self.rebase();
        }

        self.segments = compute_segments(&round.participants);
        let waiting = round.status == RoundStatus::Waiting;
        self.round = Some(round);
        self.phase = self.resting_phase();

        let mut events = Vec::new();
        if self.config.triggers.server_status && waiting {
            events.extend(self.request_spin(SpinTrigger::RoundWaiting));
        }
        events
    }

    /// Turns the settled rotation forward to the next whole turn so a new
    /// round's wheel starts at its zero position without spinning backwards.
    fn rebase(&mut self) {
        self.animation = None;
        let turns = (self.rotation / FULL_TURN).ceil();
        self.rotation = turns * FULL_TURN;
    }

    fn resting_phase(&self) -> SpinPhase {
        match &self.round {
            Some(round)
                if round.status != RoundStatus::Resolved
                    && !self.segments.is_empty()
                    && self.spun_round.as_ref() != Some(&round.id) =>
            {
                SpinPhase::Countdown
            }
            _ => SpinPhase::Idle,
        }
    }
}

/// Same curve as `cubic-bezier(0.33, 1, 0.68, 1)`.
fn ease_out_cubic(progress: f64) -> f64 {
    1.0 - (1.0 - progress).powi(3)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::random::SequenceSource;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    fn round(id: &str, status: RoundStatus, end_in: i64, deposits: &[(&str, f64)]) -> Round {
        Round {
            id: RoundId::new(id),
            status,
            end_time: t0() + secs(end_in),
            participants: deposits
                .iter()
                .map(|(name, amount)| Participant::new(*name, *amount, format!("{name}-key")))
                .collect(),
            prize_amount: deposits.iter().map(|(_, amount)| amount).sum(),
            winner_identity: None,
        }
    }

    fn both_triggers() -> SpinConfig {
        SpinConfig {
            triggers: SpinTriggers {
                countdown: true,
                server_status: true,
            },
            ..SpinConfig::server()
        }
    }

    fn requested(events: &[SpinEvent]) -> Vec<&SpinRequest> {
        events
            .iter()
            .filter_map(|event| match event {
                SpinEvent::SpinRequested(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Machine already spinning round `r1` towards `winner`, started at `t0`.
    fn spinning_machine(config: SpinConfig, winner: &str) -> SpinMachine {
        let mut machine = SpinMachine::new(config);
        let events = machine.observe_round(
            Some(round("r1", RoundStatus::Waiting, 0, &[("A", 70.0), ("B", 30.0)])),
            t0(),
        );
        assert_eq!(requested(&events).len(), 1);
        machine
            .begin_spin_for_winner(&RoundId::new("r1"), winner, 100.0, t0(), t0())
            .unwrap();
        machine
    }

    #[test]
    fn observe_round__without_participants_never_spins() {
        // given
        let mut machine = SpinMachine::new(both_triggers());

        // when
        let observed = machine.observe_round(Some(round("r1", RoundStatus::Waiting, 0, &[])), t0());
        let ticked = machine.tick(t0() + secs(30));

        // then
        assert!(observed.is_empty());
        assert!(ticked.is_empty());
        assert_eq!(machine.phase(), SpinPhase::Idle);
    }

    #[test]
    fn observe_round__requests_one_spin_when_both_triggers_fire() {
        // given
        let mut machine = SpinMachine::new(both_triggers());
        let waiting = round("r1", RoundStatus::Waiting, -1, &[("A", 70.0), ("B", 30.0)]);

        // when
        let mut events = machine.observe_round(Some(waiting.clone()), t0());
        events.extend(machine.tick(t0()));
        events.extend(machine.observe_round(Some(waiting), t0() + secs(5)));
        events.extend(machine.tick(t0() + secs(5)));

        // then
        let requests = requested(&events);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].round_id, RoundId::new("r1"));
        assert_eq!(requests[0].trigger, SpinTrigger::RoundWaiting);
        assert_eq!(machine.phase(), SpinPhase::Spinning);
    }

    #[test]
    fn begin_spin_for_winner__rotates_by_worked_example() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        machine.observe_round(
            Some(round("r1", RoundStatus::Waiting, 0, &[("A", 70.0), ("B", 30.0)])),
            t0(),
        );

        // when
        let rotation = machine
            .begin_spin_for_winner(&RoundId::new("r1"), "B", 100.0, t0(), t0())
            .unwrap();

        // then
        assert!((rotation - 5409.0).abs() < 1e-9);
        assert!((machine.rotation() - 5409.0).abs() < 1e-9);
    }

    #[test]
    fn begin_spin_for_winner__rejects_round_without_pending_request() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        machine.observe_round(
            Some(round("r1", RoundStatus::Active, 120, &[("A", 1.0)])),
            t0(),
        );

        // when
        let err = machine
            .begin_spin_for_winner(&RoundId::new("r1"), "A", 1.0, t0(), t0())
            .unwrap_err();

        // then
        assert_eq!(
            err,
            SpinError::NotRequested {
                round_id: RoundId::new("r1")
            }
        );
        assert_eq!(machine.phase(), SpinPhase::Countdown);
    }

    #[test]
    fn begin_spin_for_winner__unknown_winner_returns_to_countdown() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        let waiting = round("r1", RoundStatus::Waiting, 0, &[("A", 70.0), ("B", 30.0)]);
        machine.observe_round(Some(waiting.clone()), t0());

        // when
        let err = machine
            .begin_spin_for_winner(&RoundId::new("r1"), "Z", 100.0, t0(), t0())
            .unwrap_err();

        // then
        assert!(matches!(
            err,
            SpinError::Resolve(ResolveError::UnknownWinner { .. })
        ));
        assert_eq!(machine.phase(), SpinPhase::Countdown);
        assert!(!machine.is_spinning());
        let retried = machine.observe_round(Some(waiting), t0() + secs(5));
        assert_eq!(requested(&retried).len(), 1);
    }

    #[test]
    fn abort_spin__lets_a_later_poll_retry() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        let waiting = round("r1", RoundStatus::Waiting, 0, &[("A", 5.0)]);
        machine.observe_round(Some(waiting.clone()), t0());

        // when
        let aborted = machine.abort_spin(&RoundId::new("r1"));
        let retried = machine.observe_round(Some(waiting), t0() + secs(5));

        // then
        assert!(aborted);
        assert_eq!(requested(&retried).len(), 1);
        assert!(!machine.abort_spin(&RoundId::new("other")));
    }

    #[test]
    fn tick__reveals_only_after_spin_duration() {
        // given
        let mut machine = spinning_machine(SpinConfig::server(), "A");

        // when
        let early = machine.tick(t0() + TimeDelta::milliseconds(5_999));
        let on_time = machine.tick(t0() + secs(6));

        // then
        assert!(early.is_empty());
        assert_eq!(
            on_time,
            vec![SpinEvent::Revealed(WinnerRecord {
                identity: "A".to_string(),
                wallet_address: "A-key".to_string(),
                prize_amount: 100.0,
                resolved_at: t0(),
            })]
        );
        assert_eq!(machine.phase(), SpinPhase::Revealed);
        assert_eq!(
            machine.snapshot(t0() + secs(7)).winner.map(|w| w.identity),
            Some("A".to_string())
        );
    }

    #[test]
    fn tick__settles_after_reveal_and_keeps_guard() {
        // given
        let mut machine = spinning_machine(SpinConfig::server(), "A");
        machine.tick(t0() + secs(6));

        // when
        let settled = machine.tick(t0() + secs(11));
        let again = machine.observe_round(
            Some(round("r1", RoundStatus::Waiting, 0, &[("A", 70.0), ("B", 30.0)])),
            t0() + secs(12),
        );

        // then
        assert_eq!(
            settled,
            vec![SpinEvent::Settled {
                round_id: RoundId::new("r1"),
                cleared: false,
            }]
        );
        assert!(again.is_empty());
        assert_eq!(machine.phase(), SpinPhase::Idle);
        assert!(machine.snapshot(t0() + secs(12)).winner.is_none());
    }

    #[test]
    fn observe_round__holds_back_new_round_until_reveal_ends() {
        // given
        let mut machine = spinning_machine(SpinConfig::server(), "B");
        let frozen = machine.segments().to_vec();

        // when
        machine.observe_round(
            Some(round("r2", RoundStatus::Active, 300, &[("C", 1.0)])),
            t0() + secs(2),
        );
        let during = machine.snapshot(t0() + secs(3));
        machine.tick(t0() + secs(6));
        machine.tick(t0() + secs(11));
        let after = machine.snapshot(t0() + secs(11));

        // then
        assert_eq!(during.segments, frozen);
        assert_eq!(during.round_id, Some(RoundId::new("r1")));
        assert_eq!(after.round_id, Some(RoundId::new("r2")));
        assert_eq!(after.segments.len(), 1);
        assert_eq!(after.phase, SpinPhase::Countdown);
    }

    #[test]
    fn observe_round__new_round_rebases_rotation_and_resets_guard() {
        // given
        let mut machine = spinning_machine(SpinConfig::server(), "B");
        machine.tick(t0() + secs(6));
        machine.tick(t0() + secs(11));

        // when
        let events = machine.observe_round(
            Some(round("r2", RoundStatus::Waiting, 0, &[("A", 70.0), ("B", 30.0)])),
            t0() + secs(15),
        );

        // then
        assert!((machine.rotation() - 5760.0).abs() < 1e-9);
        let requests = requested(&events);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].round_id, RoundId::new("r2"));
    }

    #[test]
    fn snapshot__eases_rotation_during_spin() {
        // given
        let machine = spinning_machine(SpinConfig::server(), "B");

        // when
        let start = machine.snapshot(t0());
        let halfway = machine.snapshot(t0() + secs(3));
        let end = machine.snapshot(t0() + secs(6));

        // then
        assert!(start.rotation.abs() < 1e-9);
        assert!((halfway.rotation - 5409.0 * 0.875).abs() < 1e-6);
        assert!((end.rotation - 5409.0).abs() < 1e-9);
        assert!((halfway.target_rotation - 5409.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot__closes_deposits_inside_cutoff() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        machine.observe_round(
            Some(round("r1", RoundStatus::Active, 90, &[("A", 1.0)])),
            t0(),
        );

        // when
        let open = machine.snapshot(t0() + secs(29));
        let closed = machine.snapshot(t0() + secs(30));

        // then
        assert!(open.deposits_open);
        assert_eq!(open.countdown, Some(secs(61)));
        assert!(!closed.deposits_open);
        assert_eq!(closed.countdown, Some(secs(60)));
    }

    #[test]
    fn snapshot__countdown_is_whole_seconds_and_never_negative() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::server());
        machine.observe_round(Some(round("r1", RoundStatus::Active, 90, &[])), t0());

        // when
        let partial = machine.snapshot(t0() + TimeDelta::milliseconds(300));
        let late = machine.snapshot(t0() + secs(500));

        // then
        assert_eq!(partial.countdown, Some(secs(89)));
        assert_eq!(late.countdown, Some(secs(0)));
    }

    #[test]
    fn tick__simulated_round_spins_on_countdown_and_clears_after_reveal() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::simulated(secs(10)));
        machine.observe_round(
            Some(round("sim-1", RoundStatus::Active, 30, &[("A", 70.0), ("B", 30.0)])),
            t0(),
        );
        let mut random = SequenceSource::new(vec![71]);

        // when
        let before = machine.tick(t0() + secs(29));
        let at_end = machine.tick(t0() + secs(30));
        let outcome = machine
            .begin_spin_with_draw(&RoundId::new("sim-1"), &mut random, t0() + secs(30))
            .unwrap();
        machine.tick(t0() + secs(36));
        let settled = machine.tick(t0() + secs(41));

        // then
        assert!(before.is_empty());
        assert_eq!(requested(&at_end)[0].trigger, SpinTrigger::CountdownElapsed);
        assert_eq!(outcome.winner, "B");
        assert_eq!(
            settled,
            vec![SpinEvent::Settled {
                round_id: RoundId::new("sim-1"),
                cleared: true,
            }]
        );
        let snapshot = machine.snapshot(t0() + secs(41));
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.segments.is_empty());
        assert_eq!(snapshot.phase, SpinPhase::Idle);
    }

    #[test]
    fn tick__countdown_trigger_fires_once_per_round() {
        // given
        let mut machine = SpinMachine::new(SpinConfig::simulated(secs(10)));
        machine.observe_round(
            Some(round("sim-1", RoundStatus::Active, 0, &[("A", 1.0)])),
            t0(),
        );
        machine.abort_spin(&RoundId::new("sim-1"));

        // when
        let events = machine.tick(t0() + secs(1));

        // then
        assert!(events.is_empty());
        assert_eq!(machine.phase(), SpinPhase::Countdown);
    }
}
