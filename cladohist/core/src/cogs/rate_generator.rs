use crate::{cogs::MathsCore, matrix::TransitionMatrix};

/// A continuous-time Markov rate model over a finite state space.
pub trait RateGenerator: core::fmt::Debug {
    #[must_use]
    fn num_states(&self) -> usize;

    /// Transition probabilities along the interval from `start_age` down to
    /// the younger `end_age`, with all rates scaled by `clock_rate`.
    #[must_use]
    fn calculate_transition_probabilities<M: MathsCore>(
        &self,
        start_age: f64,
        end_age: f64,
        clock_rate: f64,
    ) -> TransitionMatrix;

    #[must_use]
    fn stationary_frequencies(&self) -> Vec<f64>;

    /// The instantaneous rate `q(from, to)` for `from != to`.
    #[must_use]
    fn instantaneous_rate(&self, from: usize, to: usize) -> f64;

    /// The total rate of leaving `from`.
    #[must_use]
    fn exit_rate(&self, from: usize) -> f64 {
        (0..self.num_states())
            .filter(|to| *to != from)
            .map(|to| self.instantaneous_rate(from, to))
            .sum()
    }
}
