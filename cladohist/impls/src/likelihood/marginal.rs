use cladohist_core::{
    cogs::{MathsCore, RateGenerator, Tree},
    error::LikelihoodError,
};

use super::TreeLikelihood;

impl<M: MathsCore, R: RateGenerator> TreeLikelihood<M, R> {
    /// Computes the marginal likelihood of every state at every node with a
    /// preorder pass over the outside likelihoods. Requires the partial
    /// likelihoods of the same tree from [`Self::compute_ln_probability`].
    ///
    /// The invariant-sites component is not included.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::PartialsNotComputed` if the partial
    /// likelihoods are missing, or another `LikelihoodError` if the model
    /// is structurally invalid at some node.
    pub fn compute_marginal_likelihoods<T: Tree>(&mut self, tree: &T) -> Result<(), LikelihoodError> {
        if !self.partials_computed || self.node_partials.len() != tree.num_nodes() {
            return Err(LikelihoodError::PartialsNotComputed);
        }

        let num_states = self.num_states();
        let frequencies = self.checked_root_frequencies()?;

        let mut outside = vec![Vec::new(); tree.num_nodes()];

        let mut root_outside = vec![0.0_f64; self.buffer_len()];
        for chunk in root_outside.chunks_mut(num_states) {
            chunk.copy_from_slice(&frequencies);
        }
        outside[tree.root()] = root_outside;

        for node in tree.preorder() {
            for child in tree.children(node) {
                let above = self.outside_above_child(tree, node, *child, &outside[node])?;

                let mut below = vec![0.0_f64; self.buffer_len()];

                for (category, matrix) in self.transition_matrices[*child].iter().enumerate() {
                    for pattern in 0..self.patterns.num_patterns() {
                        let offset = self.offset(category, pattern);
                        let range = offset..offset + num_states;

                        matrix.apply_transposed(&above[range.clone()], &mut below[range]);
                    }
                }

                outside[*child] = below;
            }
        }

        let mut marginals = Vec::with_capacity(tree.num_nodes());

        for (node, outside) in outside.iter().enumerate() {
            let mut marginal = vec![0.0_f64; self.patterns.num_patterns() * num_states];

            for (category, weight) in self.site_rates.weights().iter().enumerate() {
                for pattern in 0..self.patterns.num_patterns() {
                    let offset = self.offset(category, pattern);

                    for state in 0..num_states {
                        marginal[pattern * num_states + state] += weight
                            * outside[offset + state]
                            * self.node_partials[node][offset + state];
                    }
                }
            }

            marginals.push(marginal);
        }

        self.marginals = marginals;

        Ok(())
    }

    /// The unnormalised marginal likelihoods at `node`, laid out as
    /// `[pattern][state]`.
    #[must_use]
    pub fn marginal_likelihoods(&self, node: usize) -> Option<&[f64]> {
        self.marginals.get(node).map(Vec::as_slice)
    }

    /// The likelihood of everything outside the subtree of `child`, at the
    /// top of its branch.
    fn outside_above_child<T: Tree>(
        &self,
        tree: &T,
        node: usize,
        child: usize,
        outside: &[f64],
    ) -> Result<Vec<f64>, LikelihoodError> {
        if self.is_cladogenetic(tree, node) {
            let (map, left, right) = self.split_at(tree, node)?;

            let mut above = vec![0.0_f64; self.buffer_len()];

            for category in 0..self.site_rates.num_categories() {
                for pattern in 0..self.patterns.num_patterns() {
                    let offset = self.offset(category, pattern);

                    for (split, probability) in map.iter() {
                        let ancestor = outside[offset + split.ancestor] * probability;

                        if child == left {
                            above[offset + split.left] +=
                                ancestor * self.branch_partials[right][offset + split.right];
                        } else {
                            above[offset + split.right] +=
                                ancestor * self.branch_partials[left][offset + split.left];
                        }
                    }
                }
            }

            return Ok(above);
        }

        let mut above = outside.to_vec();

        for sibling in tree.children(node) {
            if *sibling == child {
                continue;
            }

            for (above, sibling_partial) in above.iter_mut().zip(&self.branch_partials[*sibling]) {
                *above *= sibling_partial;
            }
        }

        Ok(above)
    }
}
