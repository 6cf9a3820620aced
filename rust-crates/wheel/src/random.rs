use rand::Rng;

/// Source of winning tickets for locally simulated draws.
pub trait RandomSource {
    /// Uniform ticket in `[1, upper]`. `upper` is at least 1.
    fn ticket(&mut self, upper: u64) -> u64;
}

pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<rand::rngs::ThreadRng> {
    pub fn thread() -> Self {
        Self::new(rand::rng())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn ticket(&mut self, upper: u64) -> u64 {
        self.rng.random_range(1..=upper.max(1))
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn ticket(&mut self, upper: u64) -> u64 {
        (**self).ticket(upper)
    }
}

/// Replays a fixed list of tickets, cycling when exhausted.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Clone, Debug)]
pub struct SequenceSource {
    tickets: Vec<u64>,
    cursor: usize,
}

#[cfg(any(test, feature = "test-helpers"))]
impl SequenceSource {
    pub fn new(tickets: impl Into<Vec<u64>>) -> Self {
        Self {
            tickets: tickets.into(),
            cursor: 0,
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl RandomSource for SequenceSource {
    fn ticket(&mut self, _upper: u64) -> u64 {
        if self.tickets.is_empty() {
            return 1;
        }
        let ticket = self.tickets[self.cursor % self.tickets.len()];
        self.cursor += 1;
        ticket
    }
}
