use serde::{Deserialize, Serialize};

use cladohist_core::{
    cogs::{MathsCore, RateGenerator},
    matrix::TransitionMatrix,
};

pub mod binary;
pub mod jukes_cantor;

use binary::BinaryRateGenerator;
use jukes_cantor::JukesCantor;

#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, PartialEq, Eq)]
pub enum RateGeneratorError {
    /// a rate model needs at least two states, not {0}
    TooFewStates(usize),
    /// a rate model supports at most 64 states, not {0}
    TooManyStates(usize),
}

/// The closed set of rate models that can be selected by configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AnyRateGenerator {
    JukesCantor(JukesCantor),
    Binary(BinaryRateGenerator),
}

impl RateGenerator for AnyRateGenerator {
    fn num_states(&self) -> usize {
        match self {
            Self::JukesCantor(generator) => generator.num_states(),
            Self::Binary(generator) => generator.num_states(),
        }
    }

    fn calculate_transition_probabilities<M: MathsCore>(
        &self,
        start_age: f64,
        end_age: f64,
        clock_rate: f64,
    ) -> TransitionMatrix {
        match self {
            Self::JukesCantor(generator) => {
                generator.calculate_transition_probabilities::<M>(start_age, end_age, clock_rate)
            },
            Self::Binary(generator) => {
                generator.calculate_transition_probabilities::<M>(start_age, end_age, clock_rate)
            },
        }
    }

    fn stationary_frequencies(&self) -> Vec<f64> {
        match self {
            Self::JukesCantor(generator) => generator.stationary_frequencies(),
            Self::Binary(generator) => generator.stationary_frequencies(),
        }
    }

    fn instantaneous_rate(&self, from: usize, to: usize) -> f64 {
        match self {
            Self::JukesCantor(generator) => generator.instantaneous_rate(from, to),
            Self::Binary(generator) => generator.instantaneous_rate(from, to),
        }
    }
}

impl From<JukesCantor> for AnyRateGenerator {
    fn from(generator: JukesCantor) -> Self {
        Self::JukesCantor(generator)
    }
}

impl From<BinaryRateGenerator> for AnyRateGenerator {
    fn from(generator: BinaryRateGenerator) -> Self {
        Self::Binary(generator)
    }
}
