pub mod rate_generator;
pub mod rng;
