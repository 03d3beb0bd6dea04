use serde::{Deserialize, Serialize};

use cladohist_core::{
    cogs::{MathsCore, RateGenerator},
    matrix::TransitionMatrix,
};

use super::RateGeneratorError;

/// The equal-rates model over `k` states, scaled to one expected change per
/// unit of time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "JukesCantorRaw")]
pub struct JukesCantor {
    num_states: usize,
}

impl JukesCantor {
    /// # Errors
    ///
    /// Returns `RateGeneratorError` unless `2 <= num_states <= 64`.
    pub fn new(num_states: usize) -> Result<Self, RateGeneratorError> {
        if num_states < 2 {
            Err(RateGeneratorError::TooFewStates(num_states))
        } else if num_states > 64 {
            Err(RateGeneratorError::TooManyStates(num_states))
        } else {
            Ok(Self { num_states })
        }
    }
}

impl RateGenerator for JukesCantor {
    fn num_states(&self) -> usize {
        self.num_states
    }

    #[allow(clippy::cast_precision_loss)]
    fn calculate_transition_probabilities<M: MathsCore>(
        &self,
        start_age: f64,
        end_age: f64,
        clock_rate: f64,
    ) -> TransitionMatrix {
        let k = self.num_states as f64;
        let t = ((start_age - end_age) * clock_rate).max(0.0_f64);

        let decay = M::exp(-k * t / (k - 1.0_f64));
        let p_same = 1.0_f64 / k + (k - 1.0_f64) / k * decay;
        let p_change = (1.0_f64 - decay) / k;

        TransitionMatrix::from_fn(self.num_states, |from, to| {
            if from == to {
                p_same
            } else {
                p_change
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn stationary_frequencies(&self) -> Vec<f64> {
        vec![1.0_f64 / (self.num_states as f64); self.num_states]
    }

    #[allow(clippy::cast_precision_loss)]
    fn instantaneous_rate(&self, from: usize, to: usize) -> f64 {
        if from == to {
            -1.0_f64
        } else {
            1.0_f64 / ((self.num_states - 1) as f64)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename = "JukesCantor")]
struct JukesCantorRaw {
    num_states: usize,
}

impl TryFrom<JukesCantorRaw> for JukesCantor {
    type Error = RateGeneratorError;

    fn try_from(raw: JukesCantorRaw) -> Result<Self, Self::Error> {
        Self::new(raw.num_states)
    }
}
