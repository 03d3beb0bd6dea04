pub use cladohist_core_maths::MathsCore;

pub mod distribution;
pub use distribution::CharacterHistoryDistribution;

pub mod proposal;
pub use proposal::Proposal;

pub mod rate_generator;
pub use rate_generator::RateGenerator;

pub mod rng;
pub use rng::{RngCore, RngSampler, SeedableRng};

pub mod tree;
pub use tree::Tree;
