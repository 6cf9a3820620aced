pub mod random;
pub mod resolver;
pub mod round;
pub mod segments;
pub mod spin;

pub use random::{
    RandomSource,
    RngSource,
};
pub use resolver::{
    INDICATOR_ANGLE,
    ResolveError,
    SPIN_TURNS,
    WeightedDraw,
    resolve_angle_by_identity,
    resolve_by_weighted_draw,
    rotation_delta,
    spin_rotation,
};
pub use round::{
    Participant,
    Round,
    RoundId,
    RoundStatus,
    WinnerRecord,
};
pub use segments::{
    Segment,
    compute_segments,
    total_deposits,
};
pub use spin::{
    SpinConfig,
    SpinError,
    SpinEvent,
    SpinMachine,
    SpinOutcome,
    SpinPhase,
    SpinRequest,
    SpinSnapshot,
    SpinTrigger,
    SpinTriggers,
};

#[cfg(any(test, feature = "test-helpers"))]
pub use random::SequenceSource;
