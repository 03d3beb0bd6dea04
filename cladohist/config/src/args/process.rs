use std::num::NonZeroUsize;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cladohist_core::cogs::{CharacterHistoryDistribution, RngCore};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, PositiveF64};
use cladohist_core_maths::StdMathsCore;
use cladohist_impls::{
    cogs::rate_generator::AnyRateGenerator,
    process::{
        ctmc_history::TreeHistoryCtmc, sampled_speciation::SampledSpeciationBirthDeathProcess,
        HistoryProcess,
    },
    tree::TimeTree,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum ProcessArguments {
    SampledSpeciation {
        root_age: PositiveF64,
        speciation: PositiveF64,
        #[serde(default = "NonNegativeF64::zero")]
        extinction: NonNegativeF64,
        #[serde(default = "ClosedUnitF64::one")]
        sampling_fraction: ClosedUnitF64,
        taxa: NonZeroUsize,
    },
    Ctmc {
        rate_generator: AnyRateGenerator,
        clock_rate: PositiveF64,
        sites: NonZeroUsize,
        taxa: NonZeroUsize,
        root_age: PositiveF64,
    },
}

impl ProcessArguments {
    /// Builds the process on a random tree and draws its initial character
    /// history.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial history cannot be drawn.
    pub fn build<G: RngCore>(
        self,
        rng: &mut G,
    ) -> Result<HistoryProcess<StdMathsCore, AnyRateGenerator>> {
        let mut process: HistoryProcess<StdMathsCore, AnyRateGenerator> = match self {
            Self::SampledSpeciation {
                root_age,
                speciation,
                extinction,
                sampling_fraction,
                taxa,
            } => SampledSpeciationBirthDeathProcess::new(
                TimeTree::simulate_random(rng, taxa.get(), root_age),
                root_age,
                speciation,
                extinction,
                sampling_fraction,
            )
            .into(),
            Self::Ctmc {
                rate_generator,
                clock_rate,
                sites,
                taxa,
                root_age,
            } => TreeHistoryCtmc::new(
                TimeTree::simulate_random(rng, taxa.get(), root_age),
                rate_generator,
                clock_rate,
                sites.get(),
            )
            .into(),
        };

        process
            .redraw_value(rng)
            .context("Failed to draw the initial character history.")?;

        Ok(process)
    }
}
