use std::marker::PhantomData;

use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, RngCore, RngSampler, Tree},
    error::{HistoryError, LikelihoodError},
    history::CharacterHistory,
    probability::LnProbability,
};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, OpenUnitF64, PositiveF64};
use cladohist_core_maths::ln_factorial;

use crate::tree::TimeTree;

/// Sampled-ancestor nodes may deviate from their parent's age by at most
/// this much.
const SAMPLED_ANCESTOR_TOLERANCE: f64 = 1e-6_f64;
/// Absolute tolerance when comparing the tree's root age with the root age
/// parameter.
const ROOT_AGE_TOLERANCE: f64 = 1e-9_f64;

/// A birth-death process in which the events of the character history mark
/// speciation events whose descendants all went extinct or were not
/// sampled.
#[derive(Debug)]
pub struct SampledSpeciationBirthDeathProcess<M: MathsCore> {
    root_age: PositiveF64,
    speciation: PositiveF64,
    extinction: NonNegativeF64,
    sampling_fraction: ClosedUnitF64,
    tree: TimeTree,
    history: CharacterHistory,
    branch_ln_probabilities: Vec<f64>,
    dirty: Vec<bool>,
    marker: PhantomData<M>,
}

impl<M: MathsCore> SampledSpeciationBirthDeathProcess<M> {
    #[must_use]
    pub fn new(
        tree: TimeTree,
        root_age: PositiveF64,
        speciation: PositiveF64,
        extinction: NonNegativeF64,
        sampling_fraction: ClosedUnitF64,
    ) -> Self {
        let history = CharacterHistory::new(&tree, 1, 1, false);
        let num_nodes = tree.num_nodes();

        Self {
            root_age,
            speciation,
            extinction,
            sampling_fraction,
            tree,
            history,
            branch_ln_probabilities: vec![0.0_f64; num_nodes],
            dirty: vec![true; num_nodes],
            marker: PhantomData::<M>,
        }
    }

    #[must_use]
    pub fn root_age(&self) -> PositiveF64 {
        self.root_age
    }

    #[must_use]
    pub fn speciation(&self) -> PositiveF64 {
        self.speciation
    }

    #[must_use]
    pub fn extinction(&self) -> NonNegativeF64 {
        self.extinction
    }

    #[must_use]
    pub fn sampling_fraction(&self) -> ClosedUnitF64 {
        self.sampling_fraction
    }

    /// Replaces the tree and discards the character history.
    pub fn set_tree(&mut self, tree: TimeTree) {
        self.history.set_tree(&tree);
        self.tree = tree;
        self.touch_all();
    }

    pub fn touch_all(&mut self) {
        self.branch_ln_probabilities = vec![0.0_f64; self.tree.num_nodes()];
        self.dirty = vec![true; self.tree.num_nodes()];
    }

    /// The probability that a lineage born `age` before the present leaves
    /// no sampled descendants.
    #[must_use]
    pub fn extinction_probability(&self, age: f64) -> f64 {
        let b = self.speciation.get();
        let d = self.extinction.get();
        let rho = self.sampling_fraction.get();

        if (b - d).abs() < f64::EPSILON * b {
            return 1.0_f64 - rho / (1.0_f64 + rho * b * age);
        }

        1.0_f64
            - rho * (b - d) / (rho * b + ((1.0_f64 - rho) * b - d) * M::exp(-(b - d) * age))
    }

    fn is_valid_tree(&self) -> bool {
        let root = self.tree.root();

        if (self.tree.age(root) - self.root_age.get()).abs() > ROOT_AGE_TOLERANCE {
            warn!(
                "The tree's root age {} differs from the root age parameter {}.",
                self.tree.age(root),
                self.root_age.get()
            );

            return false;
        }

        for node in 0..self.tree.num_nodes() {
            let Some(parent) = self.tree.parent(node) else {
                continue;
            };

            let (age, parent_age) = (self.tree.age(node), self.tree.age(parent));

            if self.tree.is_sampled_ancestor(node) {
                if age > parent_age + SAMPLED_ANCESTOR_TOLERANCE {
                    warn!("The sampled ancestor {node} is older than its parent {parent}.");

                    return false;
                }

                if parent_age - age > SAMPLED_ANCESTOR_TOLERANCE {
                    warn!("The sampled ancestor {node} has a branch of non-zero length.");

                    return false;
                }
            } else if age > parent_age {
                warn!("The node {node} is older than its parent {parent}.");

                return false;
            }
        }

        true
    }

    /// The log probability of the branch above `node` and of its hidden
    /// speciation events.
    fn branch_ln_probability(&self, node: usize, parent: usize) -> Result<f64, LikelihoodError> {
        let b = self.speciation.get();
        let d = self.extinction.get();
        let ln_b = M::ln(b);

        let parent_age = self.tree.age(parent);
        let length = parent_age - self.tree.age(node);

        let mut ln_probability = 0.0_f64;
        let mut previous_age = parent_age;

        for event in self.history.branch(node)?.events() {
            let event_age = parent_age - event.time().get() * length;

            ln_probability += ln_b - (b + d) * (previous_age - event_age)
                + M::ln(self.extinction_probability(event_age));

            previous_age = event_age;
        }

        let remaining = previous_age - self.tree.age(node);

        if self.tree.is_tip(node) {
            ln_probability += -(b + d) * remaining + M::ln(self.sampling_fraction.get());
        } else {
            ln_probability += ln_b - (b + d) * remaining;
        }

        Ok(ln_probability)
    }

    /// The log number of ranked labelled topologies that share the same
    /// node ages, `(n - 1) ln 2 - ln n!`.
    fn ln_topology_factor(&self) -> f64 {
        let num_tips = self.tree.num_tips() as u64;

        #[allow(clippy::cast_precision_loss)]
        let ln_two_power = (num_tips.saturating_sub(1) as f64) * core::f64::consts::LN_2;

        ln_two_power - ln_factorial::<M>(num_tips)
    }

    fn simulate_events<G: RngCore>(&mut self, rng: &mut G) -> Result<(), HistoryError> {
        for node in 0..self.tree.num_nodes() {
            let Some(parent) = self.tree.parent(node) else {
                continue;
            };

            let parent_age = self.tree.age(parent);
            let length = parent_age - self.tree.age(node);

            if length <= 0.0_f64 {
                continue;
            }

            let mut elapsed = 0.0_f64;

            loop {
                elapsed += rng.sample_exponential::<M>(self.speciation).get();

                if elapsed >= length {
                    break;
                }

                let hidden = rng.sample_uniform_closed_open().get()
                    < self.extinction_probability(parent_age - elapsed);

                if let (true, Ok(time)) = (hidden, OpenUnitF64::new(elapsed / length)) {
                    self.history.new_event(node, 0, 0, time)?;
                }
            }
        }

        Ok(())
    }
}

impl<M: MathsCore> CharacterHistoryDistribution<M> for SampledSpeciationBirthDeathProcess<M> {
    type Tree = TimeTree;

    fn tree(&self) -> &Self::Tree {
        &self.tree
    }

    fn character_history(&self) -> &CharacterHistory {
        &self.history
    }

    fn character_history_mut(&mut self) -> &mut CharacterHistory {
        self.touch_all();

        &mut self.history
    }

    fn tree_and_history_mut(&mut self) -> (&Self::Tree, &mut CharacterHistory) {
        (&self.tree, &mut self.history)
    }

    fn compute_ln_probability(&mut self) -> Result<LnProbability, LikelihoodError> {
        if !self.is_valid_tree() {
            return Ok(LnProbability::Impossible);
        }

        if self.dirty.len() != self.tree.num_nodes() {
            self.touch_all();
        }

        let mut ln_probability = LnProbability::new(self.ln_topology_factor());

        for node in self.tree.postorder() {
            let Some(parent) = self.tree.parent(node) else {
                continue;
            };

            if self.dirty[node] {
                self.branch_ln_probabilities[node] = self.branch_ln_probability(node, parent)?;
                self.dirty[node] = false;
            }

            ln_probability += self.branch_ln_probabilities[node];
        }

        Ok(ln_probability)
    }

    fn redraw_value<G: RngCore>(&mut self, rng: &mut G) -> Result<(), HistoryError> {
        let tree = TimeTree::simulate_random(rng, self.tree.num_tips(), self.root_age);

        self.set_tree(tree);
        self.simulate_events(rng)?;

        info!(
            "Redrew a birth-death tree with {} tips and {} hidden speciation events.",
            self.tree.num_tips(),
            self.history.total_event_count()
        );

        Ok(())
    }

    fn touch_branch(&mut self, branch: usize) {
        if let Some(dirty) = self.dirty.get_mut(branch) {
            *dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core::{
        cogs::{CharacterHistoryDistribution, SeedableRng, Tree},
        probability::LnProbability,
    };
    use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, OpenUnitF64, PositiveF64};
    use cladohist_core_maths::StdMathsCore;

    use crate::{cogs::rng::wyhash::WyHash, tree::TimeTree};

    use super::SampledSpeciationBirthDeathProcess;

    fn process(
        tree: TimeTree,
        speciation: f64,
        extinction: f64,
        sampling_fraction: f64,
    ) -> SampledSpeciationBirthDeathProcess<StdMathsCore> {
        let root_age = PositiveF64::new(tree.age(tree.root())).unwrap();

        SampledSpeciationBirthDeathProcess::new(
            tree,
            root_age,
            PositiveF64::new(speciation).unwrap(),
            NonNegativeF64::new(extinction).unwrap(),
            ClosedUnitF64::new(sampling_fraction).unwrap(),
        )
    }

    fn cherry(root_age: f64) -> TimeTree {
        TimeTree::from_parents(&[Some(2), Some(2), None], &[0.0_f64, 0.0_f64, root_age]).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-10_f64, "{a} != {b}");
    }

    #[test]
    fn cherry_without_hidden_events() {
        let mut complete = process(cherry(1.5_f64), 1.0_f64, 0.0_f64, 1.0_f64);
        assert_close(complete.compute_ln_probability().unwrap().get(), -3.0_f64);

        let mut sampled = process(cherry(1.5_f64), 1.0_f64, 0.0_f64, 0.5_f64);
        assert_close(
            sampled.compute_ln_probability().unwrap().get(),
            -3.0_f64 + 2.0_f64 * 0.5_f64.ln(),
        );
    }

    #[test]
    fn hidden_events_contribute_their_extinction_probability() {
        let (b, d) = (2.0_f64, 1.0_f64);
        let mut bd = process(cherry(2.0_f64), b, d, 1.0_f64);

        bd.character_history_mut()
            .new_event(0, 0, 0, OpenUnitF64::new(0.5_f64).unwrap())
            .unwrap();

        let p0 = 1.0_f64 - 1.0_f64 / (2.0_f64 - (-1.0_f64).exp());
        let expected = b.ln() - (b + d) * 1.0_f64 + p0.ln() - (b + d) * 1.0_f64 // tip 0
            - (b + d) * 2.0_f64; // tip 1

        assert_close(bd.extinction_probability(1.0_f64), p0);
        assert_close(bd.compute_ln_probability().unwrap().get(), expected);
    }

    #[test]
    fn hidden_events_are_impossible_under_a_complete_pure_birth_process() {
        let mut yule = process(cherry(2.0_f64), 1.0_f64, 0.0_f64, 1.0_f64);

        yule.character_history_mut()
            .new_event(1, 0, 0, OpenUnitF64::new(0.25_f64).unwrap())
            .unwrap();

        assert_eq!(
            yule.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );
    }

    #[test]
    fn critical_process_is_the_limit() {
        let critical = process(cherry(1.0_f64), 1.5_f64, 1.5_f64, 0.8_f64);
        let near_critical = process(cherry(1.0_f64), 1.5_f64, 1.5_f64 - 1e-7_f64, 0.8_f64);

        for age in [0.1_f64, 1.0_f64, 7.5_f64] {
            assert!(
                (critical.extinction_probability(age) - near_critical.extinction_probability(age))
                    .abs()
                    < 1e-5_f64
            );
        }
    }

    #[test]
    fn invalid_trees_are_impossible() {
        let mut wrong_root_age = SampledSpeciationBirthDeathProcess::<StdMathsCore>::new(
            cherry(1.0_f64),
            PositiveF64::new(2.0_f64).unwrap(),
            PositiveF64::new(1.0_f64).unwrap(),
            NonNegativeF64::zero(),
            ClosedUnitF64::one(),
        );
        assert_eq!(
            wrong_root_age.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );

        let mut inverted = cherry(1.0_f64);
        inverted.set_age(0, 1.5_f64);
        let mut inverted = process(inverted, 1.0_f64, 0.0_f64, 1.0_f64);
        assert_eq!(
            inverted.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );

        let mut long_ancestor = cherry(1.0_f64);
        long_ancestor.set_sampled_ancestor(0, true);
        let mut long_ancestor = process(long_ancestor, 1.0_f64, 0.0_f64, 1.0_f64);
        assert_eq!(
            long_ancestor.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );

        let mut sampled_ancestor = cherry(1.0_f64);
        sampled_ancestor.set_age(0, 1.0_f64 - 1e-8_f64);
        sampled_ancestor.set_sampled_ancestor(0, true);
        let mut sampled_ancestor = process(sampled_ancestor, 1.0_f64, 0.0_f64, 1.0_f64);
        assert!(!sampled_ancestor
            .compute_ln_probability()
            .unwrap()
            .is_impossible());
    }

    #[test]
    fn touched_branches_are_recomputed() {
        let mut bd = process(cherry(2.0_f64), 2.0_f64, 1.0_f64, 1.0_f64);
        let before = bd.compute_ln_probability().unwrap();

        {
            let (_, history) = bd.tree_and_history_mut();
            history
                .new_event(0, 0, 0, OpenUnitF64::new(0.5_f64).unwrap())
                .unwrap();
        }

        // The cached branch contribution is stale until the branch is touched
        assert_eq!(bd.compute_ln_probability().unwrap(), before);

        bd.touch_branch(0);
        assert_ne!(bd.compute_ln_probability().unwrap(), before);
    }

    #[test]
    fn redrawn_trees_are_valid() {
        let mut rng = WyHash::seed_from_u64(42);
        let mut bd = process(cherry(3.0_f64), 2.0_f64, 1.5_f64, 0.5_f64);

        for _ in 0..8 {
            bd.redraw_value(&mut rng).unwrap();

            assert_eq!(bd.tree().num_tips(), 2);
            assert_close(bd.tree().age(bd.tree().root()), 3.0_f64);
            assert!(bd.character_history().is_consistent());
            assert!(!bd.compute_ln_probability().unwrap().is_impossible());
        }
    }
}
