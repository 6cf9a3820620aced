//! Proportional wheel segments derived from round deposits.
//!
//! Angles are in degrees, measured the same way the wheel is drawn: segment
//! `i` starts where segment `i - 1` ends, and the first one starts at 0°.

use crate::round::Participant;

pub const FULL_TURN: f64 = 360.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub owner: String,
    pub owner_address: String,
    pub deposit: f64,
    /// `deposit / total`
    pub weight: f64,
    pub start_angle: f64,
    pub angular_width: f64,
    /// Cumulative deposit before this segment; the segment owns tickets in
    /// `(range_start, range_end]`.
    pub range_start: f64,
    pub range_end: f64,
}

impl Segment {
    pub fn midpoint(&self) -> f64 {
        (self.start_angle + self.angular_width / 2.0) % FULL_TURN
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.angular_width
    }

    /// Whether `angle` (any real value, reduced mod 360) falls inside the
    /// half-open span `[start, start + width)`.
    pub fn contains_angle(&self, angle: f64) -> bool {
        if self.angular_width <= 0.0 {
            return false;
        }
        let offset = (angle - self.start_angle).rem_euclid(FULL_TURN);
        offset < self.angular_width || self.angular_width >= FULL_TURN
    }
}

pub fn total_deposits(participants: &[Participant]) -> f64 {
    participants.iter().map(|p| p.deposit_total).sum()
}

/// One segment per participant, in input order. Returns an empty list when
/// nothing has been deposited, in which case no spin is possible.
pub fn compute_segments(participants: &[Participant]) -> Vec<Segment> {
    let total = total_deposits(participants);
    if !total.is_finite() || total <= 0.0 {
        return Vec::new();
    }

    let mut cumulative_angle = 0.0;
    let mut cumulative_deposit = 0.0;
    participants
        .iter()
        .map(|participant| {
            let deposit = participant.deposit_total;
            let weight = deposit / total;
            let angular_width = weight * FULL_TURN;
            let segment = Segment {
                owner: participant.identity.clone(),
                owner_address: participant.wallet_address.clone(),
                deposit,
                weight,
                start_angle: cumulative_angle % FULL_TURN,
                angular_width,
                range_start: cumulative_deposit,
                range_end: cumulative_deposit + deposit,
            };
            cumulative_angle += angular_width;
            cumulative_deposit += deposit;
            segment
        })
        .collect()
}
