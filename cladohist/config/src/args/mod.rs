use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use cladohist_core::cogs::{CharacterHistoryDistribution, Tree};
use cladohist_core_maths::StdMathsCore;
use cladohist_impls::{
    cogs::{rate_generator::AnyRateGenerator, rng::wyhash::WyHash},
    process::HistoryProcess,
    proposal::AnyEventTimeProposal,
};

pub mod process;
pub mod proposal;
pub mod rng;

use process::ProcessArguments;
use proposal::ProposalArguments;
use rng::RngArguments;

use crate::logger::init_logger;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainArguments {
    pub rng: RngArguments,
    pub process: ProcessArguments,
    #[serde(default)]
    pub proposals: Vec<ProposalArguments>,
    /// Installs the minimal logger at this level before the chain is built
    #[serde(default)]
    pub log_level: Option<LevelFilter>,
}

/// A ready-to-run history sampler built from [`ChainArguments`].
#[derive(Debug)]
pub struct Chain {
    pub rng: WyHash,
    pub process: HistoryProcess<StdMathsCore, AnyRateGenerator>,
    pub proposals: Vec<AnyEventTimeProposal>,
}

impl ChainArguments {
    /// # Errors
    ///
    /// Returns an error if the process cannot be built.
    pub fn build(self) -> Result<Chain> {
        if let Some(level) = self.log_level {
            if init_logger(level).is_err() {
                warn!("A logger is already installed, the log level {level} is ignored.");
            }
        }

        let mut rng = self.rng.build();

        let process = self
            .process
            .build(&mut rng)
            .context("Failed to build the character history process.")?;

        let proposals: Vec<AnyEventTimeProposal> =
            self.proposals.into_iter().map(Into::into).collect();

        info!(
            "Built a chain over {} tips with {} history events and {} proposals.",
            process.tree().num_tips(),
            process.character_history().total_event_count(),
            proposals.len()
        );

        Ok(Chain {
            rng,
            process,
            proposals,
        })
    }
}
