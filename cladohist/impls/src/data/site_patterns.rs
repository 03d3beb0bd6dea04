use fnv::FnvHashMap;

use cladohist_core::error::LikelihoodError;

use super::{CharacterMatrix, DiscreteCharacter};

/// The distinct site columns of a [`CharacterMatrix`], each with the
/// number of sites that share it.
#[derive(Clone, Debug)]
pub struct SitePatterns {
    num_states: usize,
    num_tips: usize,
    // Pattern-major: `characters[pattern * num_tips + tip]`
    characters: Vec<DiscreteCharacter>,
    weights: Vec<f64>,
    site_patterns: Vec<usize>,
    invariant_masks: Vec<u64>,
}

impl SitePatterns {
    /// Merges identical site columns across the first `num_tips` tips.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::MissingTipData` if any of the tips has no
    /// observed characters.
    pub fn compress(matrix: &CharacterMatrix, num_tips: usize) -> Result<Self, LikelihoodError> {
        let tips = (0..num_tips)
            .map(|tip| matrix.tip(tip).ok_or(LikelihoodError::MissingTipData(tip)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut lookup: FnvHashMap<Vec<DiscreteCharacter>, usize> = FnvHashMap::default();

        let mut characters = Vec::new();
        let mut weights = Vec::new();
        let mut site_patterns = Vec::with_capacity(matrix.num_sites());
        let mut invariant_masks = Vec::new();

        for site in 0..matrix.num_sites() {
            let column: Vec<DiscreteCharacter> = tips.iter().map(|tip| tip[site]).collect();

            let pattern = *lookup.entry(column.clone()).or_insert_with(|| {
                invariant_masks.push(
                    column
                        .iter()
                        .fold(DiscreteCharacter::missing(matrix.num_states()).mask(), |mask, c| {
                            mask & c.mask()
                        }),
                );
                characters.extend_from_slice(&column);
                weights.push(0.0_f64);

                weights.len() - 1
            });

            weights[pattern] += 1.0_f64;
            site_patterns.push(pattern);
        }

        Ok(Self {
            num_states: matrix.num_states(),
            num_tips,
            characters,
            weights,
            site_patterns,
            invariant_masks,
        })
    }

    #[must_use]
    pub const fn num_states(&self) -> usize {
        self.num_states
    }

    #[must_use]
    pub const fn num_tips(&self) -> usize {
        self.num_tips
    }

    #[must_use]
    pub fn num_patterns(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn num_sites(&self) -> usize {
        self.site_patterns.len()
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn pattern_of_site(&self, site: usize) -> usize {
        self.site_patterns[site]
    }

    #[must_use]
    pub fn character(&self, tip: usize, pattern: usize) -> DiscreteCharacter {
        self.characters[pattern * self.num_tips + tip]
    }

    /// Whether every tip of the `pattern` is compatible with `state`, i.e.
    /// whether the pattern could be invariant in `state`.
    #[must_use]
    pub fn is_invariant_in(&self, pattern: usize, state: usize) -> bool {
        state < 64 && (self.invariant_masks[pattern] >> state) & 1 == 1
    }
}
