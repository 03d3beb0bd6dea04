use serde::{Deserialize, Serialize};

use cladohist_core::cogs::SeedableRng;
use cladohist_impls::cogs::rng::wyhash::WyHash;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RngArguments {
    Seed(u64),
}

impl RngArguments {
    #[must_use]
    pub fn build(&self) -> WyHash {
        match self {
            Self::Seed(seed) => WyHash::seed_from_u64(*seed),
        }
    }
}
