mod character_matrix;
mod site_patterns;

pub use character_matrix::{CharacterMatrix, DiscreteCharacter};
pub use site_patterns::SitePatterns;
