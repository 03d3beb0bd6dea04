use cladohist_core::{
    cogs::{MathsCore, RateGenerator, RngCore, RngSampler, Tree},
    error::LikelihoodError,
    event_map::CladogenesisModel,
    history::CharacterHistory,
    probability::LnProbability,
};

use crate::{
    data::{CharacterMatrix, SitePatterns},
    likelihood::TreeLikelihood,
};

/// A phylogenetic CTMC with cladogenetic state changes at every speciation,
/// both at the internal nodes of the tree and at the hidden speciation
/// events recorded in a character history.
#[derive(Debug)]
pub struct PhyloCtmcClado<M: MathsCore, R: RateGenerator> {
    likelihood: TreeLikelihood<M, R>,
}

impl<M: MathsCore, R: RateGenerator> PhyloCtmcClado<M, R> {
    #[must_use]
    pub fn new(likelihood: TreeLikelihood<M, R>, cladogenesis: CladogenesisModel) -> Self {
        Self {
            likelihood: likelihood.with_cladogenesis(cladogenesis),
        }
    }

    #[must_use]
    pub fn likelihood(&self) -> &TreeLikelihood<M, R> {
        &self.likelihood
    }

    #[must_use]
    pub fn likelihood_mut(&mut self) -> &mut TreeLikelihood<M, R> {
        &mut self.likelihood
    }

    /// Computes the log-likelihood of the tip data, composing the branch
    /// transition matrices with the cladogenetic events in `history`.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if the tree, history, data, and model are
    /// structurally incompatible.
    pub fn compute_ln_probability<T: Tree>(
        &mut self,
        tree: &T,
        history: &CharacterHistory,
    ) -> Result<LnProbability, LikelihoodError> {
        self.likelihood.compute_ln_probability(tree, Some(history))
    }

    /// Simulates new tip data on `tree` and replaces the observed data with
    /// it. Returns the simulated tip data.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if the tree, history, and model are
    /// structurally incompatible.
    pub fn redraw_value<T: Tree, G: RngCore>(
        &mut self,
        tree: &T,
        history: &CharacterHistory,
        rng: &mut G,
    ) -> Result<CharacterMatrix, LikelihoodError> {
        let num_sites = self.likelihood.patterns().num_sites();
        let p_inv = self.likelihood.p_inv();

        // Invariant sites have no rate category
        let per_site_rates: Vec<Option<usize>> = (0..num_sites)
            .map(|_| {
                if rng.sample_event(p_inv) {
                    None
                } else {
                    Some(
                        rng.sample_weighted_index(self.likelihood.site_rates().weights())
                            .unwrap_or(0),
                    )
                }
            })
            .collect();

        let frequencies = self.likelihood.root_frequencies();

        let mut taxa = vec![Vec::new(); tree.num_nodes()];
        taxa[tree.root()] = (0..num_sites)
            .map(|_| rng.sample_weighted_index(&frequencies).unwrap_or(0))
            .collect();

        self.simulate(tree, history, tree.root(), &mut taxa, &per_site_rates, rng)?;

        let mut matrix =
            CharacterMatrix::new(tree.num_tips(), num_sites, self.likelihood.num_states());
        for (tip, states) in taxa.iter().enumerate().take(tree.num_tips()) {
            matrix.set_tip_states(tip, states)?;
        }

        self.likelihood
            .set_patterns(SitePatterns::compress(&matrix, tree.num_tips())?);

        info!(
            "Redrew {} sites of cladogenetic character data for {} tips.",
            num_sites,
            tree.num_tips()
        );

        Ok(matrix)
    }

    /// Recursively simulates the states at the end of every branch below
    /// `node`, given the states at `node` in `taxa`. Sites without a rate
    /// category are invariant.
    ///
    /// The branches below `node` evolve through the hidden cladogenetic
    /// events that `history` records on them.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::NonBifurcating` if an internal node does not
    /// have exactly two children, and another `LikelihoodError` if a branch
    /// history or event map is missing.
    pub fn simulate<T: Tree, G: RngCore>(
        &self,
        tree: &T,
        history: &CharacterHistory,
        node: usize,
        taxa: &mut [Vec<usize>],
        per_site_rates: &[Option<usize>],
        rng: &mut G,
    ) -> Result<(), LikelihoodError> {
        let (left, right) = match tree.children(node) {
            [] => return Ok(()),
            [left, right] => (*left, *right),
            children => {
                return Err(LikelihoodError::NonBifurcating {
                    node,
                    children: children.len(),
                })
            },
        };

        let map = self
            .likelihood
            .cladogenesis()
            .and_then(|model| model.for_node(node))
            .ok_or(LikelihoodError::MissingEventMap(node))?;

        let mut left_states = Vec::with_capacity(per_site_rates.len());
        let mut right_states = Vec::with_capacity(per_site_rates.len());

        for (state, rate) in taxa[node].iter().zip(per_site_rates) {
            let mut split = (*state, *state);

            if rate.is_some() {
                let mut u = rng.sample_uniform_closed_open().get();

                for (candidate, probability) in map.splits_from(*state) {
                    u -= probability;

                    if u < 0.0_f64 {
                        split = (candidate.left, candidate.right);
                        break;
                    }
                }
            }

            left_states.push(split.0);
            right_states.push(split.1);
        }

        for (child, start_states) in [(left, left_states), (right, right_states)] {
            let matrices = (0..self.likelihood.site_rates().num_categories())
                .map(|category| {
                    self.likelihood
                        .branch_transition_matrix(tree, Some(history), child, category)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut end_states = Vec::with_capacity(start_states.len());

            for (start_state, rate) in start_states.iter().zip(per_site_rates) {
                let Some(category) = rate else {
                    end_states.push(*start_state);
                    continue;
                };

                end_states.push(
                    rng.sample_weighted_index(matrices[*category].row(*start_state))
                        .unwrap_or(*start_state),
                );
            }

            taxa[child] = end_states;

            self.simulate(tree, history, child, taxa, per_site_rates, rng)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core::{
        cogs::{SeedableRng, Tree},
        error::LikelihoodError,
        event_map::{CladogenesisModel, CladogeneticEventMap, Split},
        history::CharacterHistory,
    };
    use cladohist_core_bond::{ClosedUnitF64, OpenUnitF64, PositiveF64};
    use cladohist_core_maths::StdMathsCore;

    use crate::{
        cogs::{rate_generator::jukes_cantor::JukesCantor, rng::wyhash::WyHash},
        data::{CharacterMatrix, SitePatterns},
        likelihood::TreeLikelihood,
        tree::TimeTree,
    };

    use super::PhyloCtmcClado;

    fn clado(
        tips: &[&str],
        map: CladogeneticEventMap,
    ) -> PhyloCtmcClado<StdMathsCore, JukesCantor> {
        let mut matrix = CharacterMatrix::new(tips.len(), tips[0].len(), 2);
        for (tip, symbols) in tips.iter().enumerate() {
            matrix.set_tip_symbols(tip, symbols).unwrap();
        }

        PhyloCtmcClado::new(
            TreeLikelihood::new(
                JukesCantor::new(2).unwrap(),
                PositiveF64::new(1.0_f64).unwrap(),
                SitePatterns::compress(&matrix, tips.len()).unwrap(),
            ),
            CladogenesisModel::Homogeneous(map),
        )
    }

    fn sympatric_map() -> CladogeneticEventMap {
        CladogeneticEventMap::new(
            2,
            [
                (Split::new(0, 0, 1), ClosedUnitF64::one()),
                (Split::new(1, 1, 1), ClosedUnitF64::one()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn hidden_events_change_the_likelihood() {
        let tree = TimeTree::from_parents(&[Some(2), Some(2), None], &[0.0_f64, 0.0_f64, 0.8_f64])
            .unwrap();
        let mut history = CharacterHistory::new(&tree, 1, 2, false);
        let mut model = clado(&["00101", "01100"], sympatric_map());

        let without = model.compute_ln_probability(&tree, &history).unwrap();

        history
            .new_event(1, 0, 0, OpenUnitF64::new(0.5_f64).unwrap())
            .unwrap();
        let with = model.compute_ln_probability(&tree, &history).unwrap();

        assert!(!without.is_impossible());
        assert!(!with.is_impossible());
        assert_ne!(without, with);
    }

    #[test]
    fn splits_are_simulated_from_the_event_map() {
        let tree =
            TimeTree::from_parents(&[Some(2), Some(2), None], &[0.0_f64, 0.0_f64, 0.0_f64]).unwrap();
        let history = CharacterHistory::new(&tree, 1, 2, false);
        let mut rng = WyHash::seed_from_u64(21);

        let mut model = clado(&["0000", "0000"], sympatric_map());
        model.likelihood = model
            .likelihood
            .with_root_frequencies(vec![1.0_f64, 0.0_f64])
            .unwrap();

        let matrix = model.redraw_value(&tree, &history, &mut rng).unwrap();

        let left: Vec<_> = matrix.tip(0).unwrap().iter().map(|c| c.unambiguous_state()).collect();
        let right: Vec<_> = matrix.tip(1).unwrap().iter().map(|c| c.unambiguous_state()).collect();

        assert_eq!(left, vec![Some(0); 4]);
        assert_eq!(right, vec![Some(1); 4]);

        assert!(!model
            .compute_ln_probability(&tree, &history)
            .unwrap()
            .is_impossible());
    }

    #[test]
    fn hidden_events_are_simulated_along_their_branch() {
        let tree =
            TimeTree::from_parents(&[Some(2), Some(2), None], &[0.0_f64, 0.0_f64, 0.0_f64]).unwrap();
        let mut rng = WyHash::seed_from_u64(89);

        let tips = "0".repeat(64);
        let mut model = clado(&[tips.as_str(), tips.as_str()], sympatric_map());
        model.likelihood = model
            .likelihood
            .with_root_frequencies(vec![1.0_f64, 0.0_f64])
            .unwrap();

        let mut history = CharacterHistory::new(&tree, 1, 2, false);
        let states = |matrix: &CharacterMatrix, tip: usize| -> Vec<Option<usize>> {
            matrix
                .tip(tip)
                .unwrap()
                .iter()
                .map(|c| c.unambiguous_state())
                .collect()
        };

        let matrix = model.redraw_value(&tree, &history, &mut rng).unwrap();
        assert_eq!(states(&matrix, 0), vec![Some(0); 64]);

        // A hidden speciation on the left branch moves half of its lineages
        // into the right daughter's state
        history
            .new_event(0, 0, 0, OpenUnitF64::new(0.5_f64).unwrap())
            .unwrap();

        let matrix = model.redraw_value(&tree, &history, &mut rng).unwrap();
        let left = states(&matrix, 0);

        assert!(left.contains(&Some(0)));
        assert!(left.contains(&Some(1)));
        assert_eq!(states(&matrix, 1), vec![Some(1); 64]);
    }

    #[test]
    fn invariant_sites_skip_cladogenesis() {
        let tree =
            TimeTree::from_parents(&[Some(2), Some(2), None], &[0.0_f64, 0.0_f64, 1.0_f64]).unwrap();
        let history = CharacterHistory::new(&tree, 1, 2, false);
        let mut rng = WyHash::seed_from_u64(2);

        let mut model = clado(&["000000", "000000"], sympatric_map());
        model.likelihood = model
            .likelihood
            .with_invariant_sites(ClosedUnitF64::one());

        let matrix = model.redraw_value(&tree, &history, &mut rng).unwrap();

        assert_eq!(matrix.tip(0), matrix.tip(1));
        assert_eq!(model.likelihood().patterns().num_sites(), 6);
    }

    #[test]
    fn simulation_needs_a_bifurcating_tree() {
        let tree = TimeTree::from_parents(
            &[Some(3), Some(3), Some(3), None],
            &[0.0_f64, 0.0_f64, 0.0_f64, 1.0_f64],
        )
        .unwrap();
        let history = CharacterHistory::new(&tree, 1, 2, false);
        let mut rng = WyHash::seed_from_u64(2);

        let mut model = clado(&["0", "1", "0"], sympatric_map());

        assert_eq!(
            model.redraw_value(&tree, &history, &mut rng).map(|_| ()),
            Err(LikelihoodError::NonBifurcating {
                node: 3,
                children: 3
            })
        );
        assert_eq!(tree.children(tree.root()).len(), 3);
    }
}
