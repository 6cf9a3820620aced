//! Maps a winner onto the wheel and computes how far the wheel has to turn to
//! bring that winner under the indicator.

use crate::{
    random::RandomSource,
    segments::{
        FULL_TURN,
        Segment,
    },
};
use std::fmt;

/// Fixed position of the indicator, in wheel degrees.
pub const INDICATOR_ANGLE: f64 = 315.0;
/// Full turns added to every spin. Cosmetic only.
pub const SPIN_TURNS: u32 = 15;
/// Keeps the delta expression non-negative before the final modulo.
const ALIGNMENT_TURNS: f64 = 3.0;

#[derive(Clone, Debug, PartialEq)]
pub enum ResolveError {
    NoSegments,
    /// The declared winner has no segment: local and server views of the
    /// round membership have diverged.
    UnknownWinner { identity: String },
    TicketOutOfRange { ticket: u64, tickets: u64 },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSegments => write!(f, "no deposits on the wheel"),
            Self::UnknownWinner { identity } => {
                write!(f, "winner {identity} is not among the round participants")
            }
            Self::TicketOutOfRange { ticket, tickets } => {
                write!(f, "ticket {ticket} outside of [1, {tickets}]")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedDraw {
    pub winner: String,
    pub winner_address: String,
    pub ticket: u64,
    pub token_angle: f64,
}

pub fn resolve_angle_by_identity(
    segments: &[Segment],
    identity: &str,
) -> Result<f64, ResolveError> {
    if segments.is_empty() {
        return Err(ResolveError::NoSegments);
    }
    segments
        .iter()
        .find(|segment| segment.owner == identity)
        .map(Segment::midpoint)
        .ok_or_else(|| ResolveError::UnknownWinner {
            identity: identity.to_string(),
        })
}

/// Draws a ticket in `[1, ceil(total)]` and places the token angle where the
/// ticket falls inside the owning segment, not at the segment midpoint.
///
/// Assumes the segments come from [`crate::compute_segments`].
pub fn resolve_by_weighted_draw<R: RandomSource>(
    segments: &[Segment],
    random: &mut R,
) -> Result<WeightedDraw, ResolveError> {
    let total = segments.last().map(|s| s.range_end).unwrap_or(0.0);
    if segments.is_empty() || total <= 0.0 {
        return Err(ResolveError::NoSegments);
    }
    let tickets = total.ceil().max(1.0) as u64;
    let ticket = random.ticket(tickets);
    if ticket == 0 || ticket > tickets {
        return Err(ResolveError::TicketOutOfRange { ticket, tickets });
    }
    // Ticket `t` stands for the unit `(t - 1, t]`; its midpoint, scaled back
    // onto the pool, is where the draw lands. For whole-token pools the scale
    // is 1 and this is the segment whose range contains `t`.
    let position = (ticket as f64 - 0.5) * total / tickets as f64;

    let segment = segments
        .iter()
        .find(|s| s.deposit > 0.0 && position <= s.range_end)
        .or_else(|| segments.iter().rev().find(|s| s.deposit > 0.0))
        .ok_or(ResolveError::NoSegments)?;

    let fraction = ((position - segment.range_start) / segment.deposit).clamp(0.0, 1.0);
    let token_angle = (segment.start_angle + fraction * segment.angular_width) % FULL_TURN;

    Ok(WeightedDraw {
        winner: segment.owner.clone(),
        winner_address: segment.owner_address.clone(),
        ticket,
        token_angle,
    })
}

/// Rotation in `[0, 360)` that brings `token_angle` under `indicator`, given
/// the wheel is currently turned by `current_rotation` degrees.
pub fn rotation_delta(indicator: f64, token_angle: f64, current_rotation: f64) -> f64 {
    let current = current_rotation.rem_euclid(FULL_TURN);
    (indicator - token_angle - current + FULL_TURN * ALIGNMENT_TURNS).rem_euclid(FULL_TURN)
}

/// Total rotation to add for one spin landing `token_angle` on the indicator.
pub fn spin_rotation(token_angle: f64, current_rotation: f64) -> f64 {
    f64::from(SPIN_TURNS) * FULL_TURN
        + rotation_delta(INDICATOR_ANGLE, token_angle, current_rotation)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        random::SequenceSource,
        round::Participant,
        segments::compute_segments,
    };
    use proptest::prelude::*;

    fn segments_of(deposits: &[(&str, f64)]) -> Vec<Segment> {
        let participants: Vec<Participant> = deposits
            .iter()
            .map(|(name, amount)| Participant::new(*name, *amount, format!("{name}-key")))
            .collect();
        compute_segments(&participants)
    }

    #[test]
    fn resolve_angle_by_identity__returns_segment_midpoint() {
        // given
        let segments = segments_of(&[("A", 70.0), ("B", 30.0)]);

        // when
        let angle = resolve_angle_by_identity(&segments, "B").unwrap();

        // then
        assert!((angle - 306.0).abs() < 1e-9);
    }

    #[test]
    fn resolve_angle_by_identity__fails_for_absent_identity() {
        // given
        let segments = segments_of(&[("A", 70.0), ("B", 30.0)]);

        // when
        let err = resolve_angle_by_identity(&segments, "Z").unwrap_err();

        // then
        assert_eq!(
            err,
            ResolveError::UnknownWinner {
                identity: "Z".to_string()
            }
        );
    }

    #[test]
    fn resolve_angle_by_identity__fails_without_segments() {
        let err = resolve_angle_by_identity(&[], "A").unwrap_err();
        assert_eq!(err, ResolveError::NoSegments);
    }

    #[test]
    fn spin_rotation__matches_worked_example() {
        // given
        let token_angle = 306.0;

        // when
        let delta = rotation_delta(INDICATOR_ANGLE, token_angle, 0.0);
        let rotation = spin_rotation(token_angle, 0.0);

        // then
        assert!((delta - 9.0).abs() < 1e-9);
        assert!((rotation - 5409.0).abs() < 1e-9);
    }

    #[test]
    fn spin_rotation__lands_token_under_indicator_from_any_start() {
        for current in [0.0, 9.0, 5409.0, 12_345.6] {
            let token_angle = 42.0;
            let final_rotation = current + spin_rotation(token_angle, current);
            let under_indicator = (token_angle + final_rotation).rem_euclid(FULL_TURN);
            assert!((under_indicator - INDICATOR_ANGLE).abs() < 1e-6);
        }
    }

    #[test]
    fn resolve_by_weighted_draw__picks_segment_owning_ticket() {
        // given
        let segments = segments_of(&[("A", 70.0), ("B", 30.0)]);
        let mut random = SequenceSource::new(vec![70, 71, 100]);

        // when
        let first = resolve_by_weighted_draw(&segments, &mut random).unwrap();
        let second = resolve_by_weighted_draw(&segments, &mut random).unwrap();
        let third = resolve_by_weighted_draw(&segments, &mut random).unwrap();

        // then
        assert_eq!(first.winner, "A");
        assert_eq!(second.winner, "B");
        assert_eq!(third.winner, "B");
        assert!(segments[0].contains_angle(first.token_angle));
        assert!(segments[1].contains_angle(second.token_angle));
        assert!(segments[1].contains_angle(third.token_angle));
    }

    #[test]
    fn resolve_by_weighted_draw__places_angle_where_ticket_fell() {
        // given
        let segments = segments_of(&[("A", 10.0)]);
        let mut random = SequenceSource::new(vec![1, 10]);

        // when
        let low = resolve_by_weighted_draw(&segments, &mut random).unwrap();
        let high = resolve_by_weighted_draw(&segments, &mut random).unwrap();

        // then
        assert!((low.token_angle - 18.0).abs() < 1e-9);
        assert!((high.token_angle - 342.0).abs() < 1e-9);
    }

    #[test]
    fn resolve_by_weighted_draw__skips_empty_segments() {
        // given
        let segments = segments_of(&[("A", 0.0), ("B", 4.0)]);
        let mut random = SequenceSource::new(vec![1]);

        // when
        let draw = resolve_by_weighted_draw(&segments, &mut random).unwrap();

        // then
        assert_eq!(draw.winner, "B");
    }

    #[test]
    fn resolve_by_weighted_draw__rejects_out_of_range_ticket() {
        let segments = segments_of(&[("A", 2.0)]);
        let mut random = SequenceSource::new(vec![3]);
        let err = resolve_by_weighted_draw(&segments, &mut random).unwrap_err();
        assert_eq!(
            err,
            ResolveError::TicketOutOfRange {
                ticket: 3,
                tickets: 2
            }
        );
    }

    #[test]
    fn resolve_by_weighted_draw__handles_fractional_pool() {
        // given
        let segments = segments_of(&[("A", 0.75), ("B", 0.75)]);
        let mut random = SequenceSource::new(vec![1, 2]);

        // when
        let first = resolve_by_weighted_draw(&segments, &mut random).unwrap();
        let second = resolve_by_weighted_draw(&segments, &mut random).unwrap();

        // then
        assert_eq!(first.winner, "A");
        assert_eq!(second.winner, "B");
        assert!(segments[0].contains_angle(first.token_angle));
        assert!(segments[1].contains_angle(second.token_angle));
    }

    proptest! {
        #[test]
        fn rotation_delta__is_deterministic_and_bounded(
            token in 0.0f64..360.0,
            current in 0.0f64..1_000_000.0,
        ) {
            let first = rotation_delta(INDICATOR_ANGLE, token, current);
            let second = rotation_delta(INDICATOR_ANGLE, token, current);
            prop_assert_eq!(first, second);
            prop_assert!((0.0..FULL_TURN).contains(&first));
        }

        #[test]
        fn resolve_angle_by_identity__stays_within_turn(
            deposits in prop::collection::vec(0.01f64..1_000.0, 1..15),
            pick in any::<prop::sample::Index>(),
        ) {
            let participants: Vec<Participant> = deposits
                .iter()
                .enumerate()
                .map(|(i, d)| Participant::new(format!("p{i}"), *d, format!("k{i}")))
                .collect();
            let segments = compute_segments(&participants);
            let identity = &participants[pick.index(participants.len())].identity;

            let angle = resolve_angle_by_identity(&segments, identity).unwrap();

            prop_assert!((0.0..FULL_TURN).contains(&angle));
        }
    }
}
