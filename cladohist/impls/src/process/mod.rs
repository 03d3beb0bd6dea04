use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, RateGenerator, RngCore},
    error::{HistoryError, LikelihoodError},
    history::CharacterHistory,
    probability::LnProbability,
};

use crate::tree::TimeTree;

pub mod ctmc_history;
pub mod sampled_speciation;

use ctmc_history::TreeHistoryCtmc;
use sampled_speciation::SampledSpeciationBirthDeathProcess;

/// The closed set of distributions that carry a character history.
#[derive(Debug)]
pub enum HistoryProcess<M: MathsCore, R: RateGenerator> {
    SampledSpeciation(SampledSpeciationBirthDeathProcess<M>),
    Ctmc(TreeHistoryCtmc<M, R>),
}

impl<M: MathsCore, R: RateGenerator> CharacterHistoryDistribution<M> for HistoryProcess<M, R> {
    type Tree = TimeTree;

    fn tree(&self) -> &Self::Tree {
        match self {
            Self::SampledSpeciation(process) => process.tree(),
            Self::Ctmc(process) => process.tree(),
        }
    }

    fn character_history(&self) -> &CharacterHistory {
        match self {
            Self::SampledSpeciation(process) => process.character_history(),
            Self::Ctmc(process) => process.character_history(),
        }
    }

    fn character_history_mut(&mut self) -> &mut CharacterHistory {
        match self {
            Self::SampledSpeciation(process) => process.character_history_mut(),
            Self::Ctmc(process) => process.character_history_mut(),
        }
    }

    fn tree_and_history_mut(&mut self) -> (&Self::Tree, &mut CharacterHistory) {
        match self {
            Self::SampledSpeciation(process) => process.tree_and_history_mut(),
            Self::Ctmc(process) => process.tree_and_history_mut(),
        }
    }

    fn compute_ln_probability(&mut self) -> Result<LnProbability, LikelihoodError> {
        match self {
            Self::SampledSpeciation(process) => process.compute_ln_probability(),
            Self::Ctmc(process) => process.compute_ln_probability(),
        }
    }

    fn redraw_value<G: RngCore>(&mut self, rng: &mut G) -> Result<(), HistoryError> {
        match self {
            Self::SampledSpeciation(process) => process.redraw_value(rng),
            Self::Ctmc(process) => process.redraw_value(rng),
        }
    }

    fn touch_branch(&mut self, branch: usize) {
        match self {
            Self::SampledSpeciation(process) => {
                CharacterHistoryDistribution::<M>::touch_branch(process, branch);
            },
            Self::Ctmc(process) => CharacterHistoryDistribution::<M>::touch_branch(process, branch),
        }
    }
}

impl<M: MathsCore, R: RateGenerator> From<SampledSpeciationBirthDeathProcess<M>>
    for HistoryProcess<M, R>
{
    fn from(process: SampledSpeciationBirthDeathProcess<M>) -> Self {
        Self::SampledSpeciation(process)
    }
}

impl<M: MathsCore, R: RateGenerator> From<TreeHistoryCtmc<M, R>> for HistoryProcess<M, R> {
    fn from(process: TreeHistoryCtmc<M, R>) -> Self {
        Self::Ctmc(process)
    }
}
