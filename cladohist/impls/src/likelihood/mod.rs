use std::marker::PhantomData;

use cladohist_core::{
    cogs::{MathsCore, RateGenerator, Tree},
    error::LikelihoodError,
    event_map::{CladogenesisModel, CladogeneticEventMap},
    history::CharacterHistory,
    matrix::TransitionMatrix,
    probability::LnProbability,
};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, PositiveF64};

use crate::{composer::compose, data::SitePatterns};

mod ancestral;
mod marginal;

pub use ancestral::AncestralStates;

#[cfg(test)]
mod tests;

/// Discrete among-site rate variation: every site evolves at one of the
/// category rates, chosen with the category weight.
#[derive(Clone, Debug)]
pub struct SiteRates {
    rates: Vec<f64>,
    weights: Vec<f64>,
}

impl SiteRates {
    #[must_use]
    pub fn homogeneous() -> Self {
        Self {
            rates: vec![1.0_f64],
            weights: vec![1.0_f64],
        }
    }

    /// # Errors
    ///
    /// Returns `LikelihoodError::DimensionMismatch` if no categories are
    /// given.
    pub fn new(categories: &[(NonNegativeF64, ClosedUnitF64)]) -> Result<Self, LikelihoodError> {
        if categories.is_empty() {
            return Err(LikelihoodError::DimensionMismatch {
                what: "site rate categories",
                expected: 1,
                found: 0,
            });
        }

        Ok(Self {
            rates: categories.iter().map(|(rate, _)| rate.get()).collect(),
            weights: categories.iter().map(|(_, weight)| weight.get()).collect(),
        })
    }

    #[must_use]
    pub fn num_categories(&self) -> usize {
        self.rates.len()
    }

    #[must_use]
    pub fn rate(&self, category: usize) -> f64 {
        self.rates[category]
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Default for SiteRates {
    fn default() -> Self {
        Self::homogeneous()
    }
}

/// Felsenstein pruning over a time tree, optionally with cladogenetic state
/// changes at the internal nodes and along the branches.
///
/// Partial likelihood buffers are laid out as
/// `[category][pattern][state]`.
#[derive(Debug)]
pub struct TreeLikelihood<M: MathsCore, R: RateGenerator> {
    rate_generator: R,
    clock_rate: PositiveF64,
    site_rates: SiteRates,
    p_inv: ClosedUnitF64,
    root_frequencies: Option<Vec<f64>>,
    cladogenesis: Option<CladogenesisModel>,
    patterns: SitePatterns,
    node_partials: Vec<Vec<f64>>,
    branch_partials: Vec<Vec<f64>>,
    transition_matrices: Vec<Vec<TransitionMatrix>>,
    marginals: Vec<Vec<f64>>,
    partials_computed: bool,
    marker: PhantomData<M>,
}

impl<M: MathsCore, R: RateGenerator> TreeLikelihood<M, R> {
    #[must_use]
    pub fn new(rate_generator: R, clock_rate: PositiveF64, patterns: SitePatterns) -> Self {
        Self {
            rate_generator,
            clock_rate,
            site_rates: SiteRates::homogeneous(),
            p_inv: ClosedUnitF64::zero(),
            root_frequencies: None,
            cladogenesis: None,
            patterns,
            node_partials: Vec::new(),
            branch_partials: Vec::new(),
            transition_matrices: Vec::new(),
            marginals: Vec::new(),
            partials_computed: false,
            marker: PhantomData::<M>,
        }
    }

    #[must_use]
    pub fn with_site_rates(mut self, site_rates: SiteRates) -> Self {
        self.site_rates = site_rates;
        self.partials_computed = false;
        self
    }

    #[must_use]
    pub fn with_invariant_sites(mut self, p_inv: ClosedUnitF64) -> Self {
        self.p_inv = p_inv;
        self
    }

    #[must_use]
    pub fn with_cladogenesis(mut self, cladogenesis: CladogenesisModel) -> Self {
        self.cladogenesis = Some(cladogenesis);
        self.partials_computed = false;
        self
    }

    /// Overrides the stationary frequencies of the rate generator at the
    /// root.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::DimensionMismatch` if there is not one
    /// frequency per state.
    pub fn with_root_frequencies(mut self, frequencies: Vec<f64>) -> Result<Self, LikelihoodError> {
        if frequencies.len() != self.rate_generator.num_states() {
            return Err(LikelihoodError::DimensionMismatch {
                what: "root frequencies",
                expected: self.rate_generator.num_states(),
                found: frequencies.len(),
            });
        }

        self.root_frequencies = Some(frequencies);

        Ok(self)
    }

    pub fn set_patterns(&mut self, patterns: SitePatterns) {
        self.patterns = patterns;
        self.partials_computed = false;
    }

    #[must_use]
    pub fn patterns(&self) -> &SitePatterns {
        &self.patterns
    }

    #[must_use]
    pub fn rate_generator(&self) -> &R {
        &self.rate_generator
    }

    #[must_use]
    pub fn site_rates(&self) -> &SiteRates {
        &self.site_rates
    }

    #[must_use]
    pub fn clock_rate(&self) -> PositiveF64 {
        self.clock_rate
    }

    #[must_use]
    pub fn p_inv(&self) -> ClosedUnitF64 {
        self.p_inv
    }

    #[must_use]
    pub fn cladogenesis(&self) -> Option<&CladogenesisModel> {
        self.cladogenesis.as_ref()
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.rate_generator.num_states()
    }

    #[must_use]
    pub fn root_frequencies(&self) -> Vec<f64> {
        self.root_frequencies
            .clone()
            .unwrap_or_else(|| self.rate_generator.stationary_frequencies())
    }

    /// The conditional likelihoods at `node`, after
    /// [`Self::compute_ln_probability`].
    #[must_use]
    pub fn node_partials(&self, node: usize) -> Option<&[f64]> {
        self.node_partials.get(node).map(Vec::as_slice)
    }

    /// The conditional likelihoods at the top of the branch above `node`,
    /// after [`Self::compute_ln_probability`].
    #[must_use]
    pub fn branch_partials(&self, node: usize) -> Option<&[f64]> {
        self.branch_partials.get(node).map(Vec::as_slice)
    }

    fn buffer_len(&self) -> usize {
        self.site_rates.num_categories() * self.patterns.num_patterns() * self.num_states()
    }

    fn offset(&self, category: usize, pattern: usize) -> usize {
        (category * self.patterns.num_patterns() + pattern) * self.num_states()
    }

    fn is_cladogenetic<T: Tree>(&self, tree: &T, node: usize) -> bool {
        self.cladogenesis.is_some() && !tree.is_tip(node)
    }

    /// The split map at a cladogenetic `node` and its `(left, right)`
    /// children.
    fn split_at<T: Tree>(
        &self,
        tree: &T,
        node: usize,
    ) -> Result<(&CladogeneticEventMap, usize, usize), LikelihoodError> {
        let map = self
            .cladogenesis
            .as_ref()
            .and_then(|model| model.for_node(node))
            .ok_or(LikelihoodError::MissingEventMap(node))?;

        if map.num_states() != self.num_states() {
            return Err(LikelihoodError::DimensionMismatch {
                what: "cladogenetic event map",
                expected: self.num_states(),
                found: map.num_states(),
            });
        }

        match tree.children(node) {
            [left, right] => Ok((map, *left, *right)),
            children => Err(LikelihoodError::NonBifurcating {
                node,
                children: children.len(),
            }),
        }
    }

    fn checked_root_frequencies(&self) -> Result<Vec<f64>, LikelihoodError> {
        let frequencies = self.root_frequencies();

        if frequencies.len() == self.num_states() {
            Ok(frequencies)
        } else {
            Err(LikelihoodError::DimensionMismatch {
                what: "root frequencies",
                expected: self.num_states(),
                found: frequencies.len(),
            })
        }
    }

    /// The transition matrix along the branch above `node` for one rate
    /// `category`. The character history, if given, supplies the
    /// cladogenetic events along the branch of a cladogenetic model. The
    /// root has an identity matrix.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if the branch history is inaccessible or
    /// its events cannot be composed.
    pub fn branch_transition_matrix<T: Tree>(
        &self,
        tree: &T,
        history: Option<&CharacterHistory>,
        node: usize,
        category: usize,
    ) -> Result<TransitionMatrix, LikelihoodError> {
        let Some(parent) = tree.parent(node) else {
            return Ok(TransitionMatrix::identity(self.num_states()));
        };

        let (start_age, end_age) = (tree.age(parent), tree.age(node));
        let clock_rate = self.clock_rate.get() * self.site_rates.rate(category);

        let branch = match (&self.cladogenesis, history) {
            (Some(_), Some(history)) => Some(history.branch(node)?),
            _ => None,
        };

        match branch {
            Some(branch) if branch.has_events() => {
                let map = self
                    .cladogenesis
                    .as_ref()
                    .and_then(|model| model.for_node(node))
                    .ok_or(LikelihoodError::MissingEventMap(node))?;

                compose::<M, R>(
                    branch,
                    &self.rate_generator,
                    clock_rate,
                    start_age,
                    end_age,
                    map,
                )
            },
            _ => Ok(self
                .rate_generator
                .calculate_transition_probabilities::<M>(start_age, end_age, clock_rate)),
        }
    }

    /// Computes the branch transition matrices for every rate category.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if a branch history is inaccessible or its
    /// events cannot be composed.
    pub fn update_transition_matrices<T: Tree>(
        &mut self,
        tree: &T,
        history: Option<&CharacterHistory>,
    ) -> Result<(), LikelihoodError> {
        let mut matrices = Vec::with_capacity(tree.num_nodes());

        for node in 0..tree.num_nodes() {
            if tree.is_root(node) {
                matrices.push(Vec::new());
                continue;
            }

            let per_category = (0..self.site_rates.num_categories())
                .map(|category| self.branch_transition_matrix(tree, history, node, category))
                .collect::<Result<Vec<_>, _>>()?;

            matrices.push(per_category);
        }

        self.transition_matrices = matrices;

        Ok(())
    }

    /// Computes the log-likelihood of the observed tip data on `tree`.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if the tree, data, and model are
    /// structurally incompatible.
    pub fn compute_ln_probability<T: Tree>(
        &mut self,
        tree: &T,
        history: Option<&CharacterHistory>,
    ) -> Result<LnProbability, LikelihoodError> {
        self.partials_computed = false;
        self.marginals.clear();

        if self.patterns.num_states() != self.num_states() {
            return Err(LikelihoodError::DimensionMismatch {
                what: "observed states",
                expected: self.num_states(),
                found: self.patterns.num_states(),
            });
        }

        self.update_transition_matrices(tree, history)?;

        self.node_partials = vec![Vec::new(); tree.num_nodes()];
        self.branch_partials = vec![Vec::new(); tree.num_nodes()];

        for node in tree.postorder() {
            let partials = if tree.is_tip(node) {
                self.tip_partials(node)?
            } else if self.is_cladogenetic(tree, node) {
                self.cladogenetic_partials(tree, node)?
            } else {
                self.anagenetic_partials(tree, node)
            };

            self.node_partials[node] = partials;

            if !tree.is_root(node) {
                self.branch_partials[node] = self.push_up_branch(node);
            }
        }

        self.partials_computed = true;

        self.root_ln_likelihood(tree.root())
    }

    fn tip_partials(&self, tip: usize) -> Result<Vec<f64>, LikelihoodError> {
        if tip >= self.patterns.num_tips() {
            return Err(LikelihoodError::MissingTipData(tip));
        }

        let mut partials = vec![0.0_f64; self.buffer_len()];

        for category in 0..self.site_rates.num_categories() {
            for pattern in 0..self.patterns.num_patterns() {
                let character = self.patterns.character(tip, pattern);
                let offset = self.offset(category, pattern);

                for (state, partial) in partials[offset..offset + self.num_states()]
                    .iter_mut()
                    .enumerate()
                {
                    if character.is_compatible(state) {
                        *partial = 1.0_f64;
                    }
                }
            }
        }

        Ok(partials)
    }

    fn anagenetic_partials<T: Tree>(&self, tree: &T, node: usize) -> Vec<f64> {
        let mut partials = vec![1.0_f64; self.buffer_len()];

        for child in tree.children(node) {
            for (partial, child_partial) in partials.iter_mut().zip(&self.branch_partials[*child]) {
                *partial *= child_partial;
            }
        }

        partials
    }

    fn cladogenetic_partials<T: Tree>(
        &self,
        tree: &T,
        node: usize,
    ) -> Result<Vec<f64>, LikelihoodError> {
        let (map, left, right) = self.split_at(tree, node)?;

        let mut partials = vec![0.0_f64; self.buffer_len()];

        let (left, right) = (&self.branch_partials[left], &self.branch_partials[right]);

        for category in 0..self.site_rates.num_categories() {
            for pattern in 0..self.patterns.num_patterns() {
                let offset = self.offset(category, pattern);

                for (split, probability) in map.iter() {
                    partials[offset + split.ancestor] += probability
                        * left[offset + split.left]
                        * right[offset + split.right];
                }
            }
        }

        Ok(partials)
    }

    fn push_up_branch(&self, node: usize) -> Vec<f64> {
        let num_states = self.num_states();
        let mut partials = vec![0.0_f64; self.buffer_len()];

        for (category, matrix) in self.transition_matrices[node].iter().enumerate() {
            for pattern in 0..self.patterns.num_patterns() {
                let offset = self.offset(category, pattern);
                let range = offset..offset + num_states;

                matrix.apply(
                    &self.node_partials[node][range.clone()],
                    &mut partials[range],
                );
            }
        }

        partials
    }

    fn root_ln_likelihood(&self, root: usize) -> Result<LnProbability, LikelihoodError> {
        let frequencies = self.checked_root_frequencies()?;
        let p_inv = self.p_inv.get();

        let mut ln_likelihood = 0.0_f64;

        for (pattern, pattern_weight) in self.patterns.weights().iter().enumerate() {
            let mut variable = 0.0_f64;

            for (category, category_weight) in self.site_rates.weights().iter().enumerate() {
                let offset = self.offset(category, pattern);

                variable += category_weight
                    * self.node_partials[root][offset..offset + self.num_states()]
                        .iter()
                        .zip(&frequencies)
                        .map(|(partial, frequency)| partial * frequency)
                        .sum::<f64>();
            }

            let invariant: f64 = frequencies
                .iter()
                .enumerate()
                .filter(|(state, _)| self.patterns.is_invariant_in(pattern, *state))
                .map(|(_, frequency)| frequency)
                .sum();

            let site_likelihood = (1.0_f64 - p_inv) * variable + p_inv * invariant;

            if site_likelihood <= 0.0_f64 || site_likelihood.is_nan() {
                return Ok(LnProbability::Impossible);
            }

            ln_likelihood += pattern_weight * M::ln(site_likelihood);
        }

        Ok(LnProbability::new(ln_likelihood))
    }
}
