use cladohist_core::{
    cogs::{MathsCore, RateGenerator, RngCore, RngSampler, Tree},
    error::LikelihoodError,
};

use super::TreeLikelihood;

/// Sampled states per node and site, at the start (parent end) and the end
/// (node end) of the branch above each node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestralStates {
    start_states: Vec<Vec<usize>>,
    end_states: Vec<Vec<usize>>,
}

impl AncestralStates {
    fn new(num_nodes: usize, num_sites: usize) -> Self {
        Self {
            start_states: vec![vec![0; num_sites]; num_nodes],
            end_states: vec![vec![0; num_sites]; num_nodes],
        }
    }

    #[must_use]
    pub fn start_states(&self, node: usize) -> &[usize] {
        &self.start_states[node]
    }

    #[must_use]
    pub fn end_states(&self, node: usize) -> &[usize] {
        &self.end_states[node]
    }
}

fn draw_weighted<G: RngCore>(rng: &mut G, weights: &[f64]) -> usize {
    rng.sample_weighted_index(weights)
        .unwrap_or_else(|| rng.sample_index(weights.len()))
}

impl<M: MathsCore, R: RateGenerator> TreeLikelihood<M, R> {
    /// Draws the state of every node and site independently from its
    /// marginal distribution. Requires
    /// [`Self::compute_marginal_likelihoods`].
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::PartialsNotComputed` if the marginal
    /// likelihoods are missing.
    pub fn draw_marginal_states<T: Tree, G: RngCore>(
        &self,
        tree: &T,
        rng: &mut G,
    ) -> Result<Vec<Vec<usize>>, LikelihoodError> {
        if self.marginals.len() != tree.num_nodes() {
            return Err(LikelihoodError::PartialsNotComputed);
        }

        let num_states = self.num_states();

        let states = self
            .marginals
            .iter()
            .map(|marginal| {
                (0..self.patterns.num_sites())
                    .map(|site| {
                        let pattern = self.patterns.pattern_of_site(site);
                        let likelihoods =
                            &marginal[pattern * num_states..(pattern + 1) * num_states];

                        draw_from_simplex(rng, likelihoods)
                    })
                    .collect()
            })
            .collect();

        Ok(states)
    }

    /// Draws jointly consistent start and end states for every node, from
    /// the root to the tips. Every site draws one rate category at the root
    /// which is then used along the whole tree.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::PartialsNotComputed` if the partial
    /// likelihoods are missing, or another `LikelihoodError` if the model
    /// is structurally invalid at some node.
    pub fn draw_joint_conditional_states<T: Tree, G: RngCore>(
        &self,
        tree: &T,
        rng: &mut G,
    ) -> Result<AncestralStates, LikelihoodError> {
        if !self.partials_computed || self.node_partials.len() != tree.num_nodes() {
            return Err(LikelihoodError::PartialsNotComputed);
        }

        let num_sites = self.patterns.num_sites();
        let mut states = AncestralStates::new(tree.num_nodes(), num_sites);
        let mut categories = vec![0; num_sites];

        let root = tree.root();

        for (site, category) in categories.iter_mut().enumerate() {
            *category = self.draw_root(tree, root, site, &mut states, rng)?;
        }

        for node in tree.preorder() {
            if node == root {
                continue;
            }

            for (site, category) in categories.iter().enumerate() {
                self.draw_below(tree, node, site, *category, &mut states, rng)?;
            }
        }

        Ok(states)
    }

    /// Draws the root states of one site, returning its rate category.
    fn draw_root<T: Tree, G: RngCore>(
        &self,
        tree: &T,
        root: usize,
        site: usize,
        states: &mut AncestralStates,
        rng: &mut G,
    ) -> Result<usize, LikelihoodError> {
        let frequencies = self.checked_root_frequencies()?;
        let pattern = self.patterns.pattern_of_site(site);
        let category_weights = self.site_rates.weights();

        if self.is_cladogenetic(tree, root) {
            let (map, left, right) = self.split_at(tree, root)?;

            let mut candidates = Vec::new();
            let mut weights = Vec::new();

            for (category, category_weight) in category_weights.iter().enumerate() {
                let offset = self.offset(category, pattern);

                for (split, probability) in map.iter() {
                    candidates.push((category, split));
                    weights.push(
                        self.node_partials[root][offset + split.ancestor]
                            * self.branch_partials[left][offset + split.left]
                            * self.branch_partials[right][offset + split.right]
                            * frequencies[split.ancestor]
                            * category_weight
                            * probability,
                    );
                }
            }

            if candidates.is_empty() {
                return Err(LikelihoodError::MissingEventMap(root));
            }

            let (category, split) = candidates[draw_weighted(rng, &weights)];

            states.start_states[root][site] = split.ancestor;
            states.end_states[root][site] = split.ancestor;
            states.start_states[left][site] = split.left;
            states.start_states[right][site] = split.right;

            return Ok(category);
        }

        let num_states = self.num_states();
        let mut weights = Vec::with_capacity(category_weights.len() * num_states);

        for (category, category_weight) in category_weights.iter().enumerate() {
            let offset = self.offset(category, pattern);

            for (state, frequency) in frequencies.iter().enumerate() {
                weights.push(frequency * category_weight * self.node_partials[root][offset + state]);
            }
        }

        let choice = draw_weighted(rng, &weights);
        let (category, state) = (choice / num_states, choice % num_states);

        states.start_states[root][site] = state;
        states.end_states[root][site] = state;
        for child in tree.children(root) {
            states.start_states[*child][site] = state;
        }

        Ok(category)
    }

    /// Draws the end state of `node` and the start states of its children,
    /// conditioned on the start state of `node`.
    fn draw_below<T: Tree, G: RngCore>(
        &self,
        tree: &T,
        node: usize,
        site: usize,
        category: usize,
        states: &mut AncestralStates,
        rng: &mut G,
    ) -> Result<(), LikelihoodError> {
        let pattern = self.patterns.pattern_of_site(site);
        let offset = self.offset(category, pattern);
        let start_state = states.start_states[node][site];
        let transitions = self.transition_matrices[node][category].row(start_state);

        if self.is_cladogenetic(tree, node) {
            let (map, left, right) = self.split_at(tree, node)?;

            let (splits, weights): (Vec<_>, Vec<_>) = map
                .iter()
                .map(|(split, probability)| {
                    (
                        split,
                        transitions[split.ancestor]
                            * probability
                            * self.branch_partials[left][offset + split.left]
                            * self.branch_partials[right][offset + split.right],
                    )
                })
                .unzip();

            if splits.is_empty() {
                return Err(LikelihoodError::MissingEventMap(node));
            }

            let split = splits[draw_weighted(rng, &weights)];

            states.end_states[node][site] = split.ancestor;
            states.start_states[left][site] = split.left;
            states.start_states[right][site] = split.right;

            return Ok(());
        }

        let weights: Vec<f64> = transitions
            .iter()
            .zip(&self.node_partials[node][offset..offset + self.num_states()])
            .map(|(transition, partial)| transition * partial)
            .collect();

        let state = draw_weighted(rng, &weights);

        states.end_states[node][site] = state;
        for child in tree.children(node) {
            states.start_states[*child][site] = state;
        }

        Ok(())
    }
}

/// Selects the first state whose cumulative normalised probability exceeds a
/// uniform draw, or a uniformly random state if all likelihoods are zero.
fn draw_from_simplex<G: RngCore>(rng: &mut G, likelihoods: &[f64]) -> usize {
    let total: f64 = likelihoods.iter().sum();

    if total <= 0.0_f64 || !total.is_finite() {
        return rng.sample_index(likelihoods.len());
    }

    let u = rng.sample_uniform_closed_open().get();
    let mut cumulative = 0.0_f64;

    for (state, likelihood) in likelihoods.iter().enumerate() {
        cumulative += likelihood / total;

        if cumulative > u {
            return state;
        }
    }

    likelihoods
        .iter()
        .rposition(|likelihood| *likelihood > 0.0_f64)
        .unwrap_or(likelihoods.len() - 1)
}

#[cfg(test)]
mod tests {
    use cladohist_core::cogs::SeedableRng;

    use crate::cogs::rng::wyhash::WyHash;

    use super::draw_from_simplex;

    #[test]
    fn empty_simplices_draw_uniformly() {
        let mut rng = WyHash::seed_from_u64(3);
        let mut counts = [0_usize; 4];

        for _ in 0..400 {
            counts[draw_from_simplex(&mut rng, &[0.0_f64; 4])] += 1;
        }

        assert!(counts.iter().all(|count| *count > 50), "{counts:?}");
    }

    #[test]
    fn simplices_are_normalised() {
        let mut rng = WyHash::seed_from_u64(4);

        for _ in 0..64 {
            assert_eq!(draw_from_simplex(&mut rng, &[0.0_f64, 3.0_f64, 0.0_f64]), 1);
        }
    }
}
