use serde::{Deserialize, Serialize};

use cladohist_core::{
    cogs::{MathsCore, RateGenerator},
    matrix::TransitionMatrix,
};
use cladohist_core_bond::PositiveF64;

/// A two-state gain (0 -> 1) and loss (1 -> 0) model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinaryRateGenerator {
    gain: PositiveF64,
    loss: PositiveF64,
}

impl BinaryRateGenerator {
    #[must_use]
    pub fn new(gain: PositiveF64, loss: PositiveF64) -> Self {
        Self { gain, loss }
    }
}

impl RateGenerator for BinaryRateGenerator {
    fn num_states(&self) -> usize {
        2
    }

    fn calculate_transition_probabilities<M: MathsCore>(
        &self,
        start_age: f64,
        end_age: f64,
        clock_rate: f64,
    ) -> TransitionMatrix {
        let total = self.gain.get() + self.loss.get();
        let t = ((start_age - end_age) * clock_rate).max(0.0_f64);

        let pi_0 = self.loss.get() / total;
        let pi_1 = self.gain.get() / total;
        let decay = M::exp(-total * t);

        let mut p = TransitionMatrix::zeros(2);
        p[(0, 0)] = pi_0 + pi_1 * decay;
        p[(0, 1)] = pi_1 * (1.0_f64 - decay);
        p[(1, 0)] = pi_0 * (1.0_f64 - decay);
        p[(1, 1)] = pi_1 + pi_0 * decay;
        p
    }

    fn stationary_frequencies(&self) -> Vec<f64> {
        let total = self.gain.get() + self.loss.get();

        vec![self.loss.get() / total, self.gain.get() / total]
    }

    fn instantaneous_rate(&self, from: usize, to: usize) -> f64 {
        match (from, to) {
            (0, 1) => self.gain.get(),
            (1, 0) => self.loss.get(),
            (0, 0) => -self.gain.get(),
            (1, 1) => -self.loss.get(),
            _ => 0.0_f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core::cogs::RateGenerator;
    use cladohist_core_maths::StdMathsCore;
    use cladohist_core_bond::PositiveF64;

    use super::BinaryRateGenerator;

    #[test]
    fn stationary_distribution_is_reached() {
        let model = BinaryRateGenerator::new(
            PositiveF64::new(1.0_f64).unwrap(),
            PositiveF64::new(3.0_f64).unwrap(),
        );

        assert_eq!(model.stationary_frequencies(), vec![0.75_f64, 0.25_f64]);

        let p = model.calculate_transition_probabilities::<StdMathsCore>(100.0_f64, 0.0_f64, 1.0_f64);
        assert!((p[(1, 0)] - 0.75_f64).abs() < 1e-12_f64);
        assert!((p[(0, 1)] - 0.25_f64).abs() < 1e-12_f64);

        let p = model.calculate_transition_probabilities::<StdMathsCore>(0.3_f64, 0.1_f64, 2.0_f64);
        assert!((p[(0, 0)] + p[(0, 1)] - 1.0_f64).abs() < 1e-12_f64);
        assert!((model.exit_rate(1) - 3.0_f64).abs() < 1e-12_f64);
    }
}
