use std::marker::PhantomData;

use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, RateGenerator, RngCore, RngSampler, Tree},
    error::{HistoryError, LikelihoodError},
    history::{CharacterEvent, CharacterHistory},
    probability::LnProbability,
};
use cladohist_core_bond::{OpenUnitF64, PositiveF64};

use crate::tree::TimeTree;

/// A continuous-time Markov chain whose full path along every branch is
/// recorded in the character history.
///
/// The synthetic root branch holds the root states.
#[derive(Debug)]
pub struct TreeHistoryCtmc<M: MathsCore, R: RateGenerator> {
    tree: TimeTree,
    rate_generator: R,
    clock_rate: PositiveF64,
    history: CharacterHistory,
    marker: PhantomData<M>,
}

impl<M: MathsCore, R: RateGenerator> TreeHistoryCtmc<M, R> {
    #[must_use]
    pub fn new(tree: TimeTree, rate_generator: R, clock_rate: PositiveF64, num_sites: usize) -> Self {
        let history = CharacterHistory::new(&tree, num_sites, rate_generator.num_states(), true);

        Self {
            tree,
            rate_generator,
            clock_rate,
            history,
            marker: PhantomData::<M>,
        }
    }

    #[must_use]
    pub fn rate_generator(&self) -> &R {
        &self.rate_generator
    }

    #[must_use]
    pub fn clock_rate(&self) -> PositiveF64 {
        self.clock_rate
    }

    /// Replaces the tree and discards the character history.
    pub fn set_tree(&mut self, tree: TimeTree) {
        self.history.set_tree(&tree);
        self.tree = tree;
    }

    /// Resimulates the given `sites` along the whole tree, starting from
    /// freshly drawn root states, and leaves all other sites untouched.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if any of the `sites` is out of range.
    pub fn redraw_sites<G: RngCore>(
        &mut self,
        rng: &mut G,
        sites: &[usize],
    ) -> Result<(), HistoryError> {
        let root = self.tree.root();
        let frequencies = self.rate_generator.stationary_frequencies();

        {
            let mut root_branch = self.history.branch_mut(root)?;

            for site in sites {
                let state = rng.sample_weighted_index(&frequencies).unwrap_or(0);

                root_branch.set_parent_state(*site, state)?;
                root_branch.set_child_state(*site, state)?;
            }
        }

        for node in self.tree.preorder() {
            let Some(parent) = self.tree.parent(node) else {
                continue;
            };

            let start_states = self.history.branch(parent)?.child_states().to_vec();
            let length = self.tree.branch_length(node);

            let mut events = Vec::new();
            let mut end_states = Vec::with_capacity(sites.len());

            for site in sites {
                let start_state = *start_states
                    .get(*site)
                    .ok_or(HistoryError::SiteOutOfRange {
                        site: *site,
                        num_sites: start_states.len(),
                    })?;

                end_states.push(self.simulate_site(
                    rng,
                    *site,
                    start_state,
                    length,
                    &mut events,
                ));
            }

            self.history.replace_events(node, sites, events)?;

            let mut branch = self.history.branch_mut(node)?;

            for (site, end_state) in sites.iter().zip(end_states) {
                branch.set_parent_state(*site, start_states[*site])?;
                branch.set_child_state(*site, end_state)?;
            }
        }

        Ok(())
    }

    /// Simulates one site along a branch of absolute `length` with the
    /// Gillespie algorithm, pushing its events and returning the end state.
    fn simulate_site<G: RngCore>(
        &mut self,
        rng: &mut G,
        site: usize,
        start_state: usize,
        length: f64,
        events: &mut Vec<CharacterEvent>,
    ) -> usize {
        let clock_rate = self.clock_rate.get();
        let num_states = self.rate_generator.num_states();

        let mut state = start_state;
        let mut elapsed = 0.0_f64;

        if length <= 0.0_f64 {
            return state;
        }

        // An absorbing state has no positive exit rate
        while let Ok(exit_rate) =
            PositiveF64::new(clock_rate * self.rate_generator.exit_rate(state))
        {
            elapsed += rng.sample_exponential::<M>(exit_rate).get();

            if elapsed >= length {
                break;
            }

            let weights: Vec<f64> = (0..num_states)
                .map(|to| {
                    if to == state {
                        0.0_f64
                    } else {
                        self.rate_generator.instantaneous_rate(state, to)
                    }
                })
                .collect();

            let Some(next_state) = rng.sample_weighted_index(&weights) else {
                break;
            };

            if let Ok(time) = OpenUnitF64::new(elapsed / length) {
                events.push(CharacterEvent::new(
                    self.history.allocate_event_id(),
                    site,
                    next_state,
                    time,
                ));

                state = next_state;
            }
        }

        state
    }

    fn is_valid_history(&self) -> Result<bool, HistoryError> {
        let root = self.tree.root();

        if !self.history.branch(root)?.is_consistent() {
            warn!("The root branch history is inconsistent.");

            return Ok(false);
        }

        for node in 0..self.tree.num_nodes() {
            let Some(parent) = self.tree.parent(node) else {
                continue;
            };

            let branch = self.history.branch(node)?;

            if branch.parent_states() != self.history.branch(parent)?.child_states() {
                warn!("The branch above {node} does not start in the states its parent ends in.");

                return Ok(false);
            }

            if !branch.is_consistent() {
                warn!("The events above {node} do not lead to its child states.");

                return Ok(false);
            }
        }

        Ok(true)
    }

    /// The log path density of the branch above `node`.
    fn branch_ln_probability(&self, node: usize) -> Result<LnProbability, HistoryError> {
        let clock_rate = self.clock_rate.get();
        let length = self.tree.branch_length(node);
        let branch = self.history.branch(node)?;

        let mut states = branch.parent_states().to_vec();
        let mut last_times = vec![0.0_f64; states.len()];

        let mut ln_probability = LnProbability::certain();

        for event in branch.events() {
            let site = event.site_index();
            let (from, to) = (states[site], event.state());

            if from == to {
                return Ok(LnProbability::Impossible);
            }

            let duration = (event.time().get() - last_times[site]) * length;

            ln_probability += -clock_rate * self.rate_generator.exit_rate(from) * duration;
            ln_probability +=
                LnProbability::new(M::ln(clock_rate * self.rate_generator.instantaneous_rate(from, to)));

            states[site] = to;
            last_times[site] = event.time().get();
        }

        for (state, last_time) in states.iter().zip(&last_times) {
            ln_probability +=
                -clock_rate * self.rate_generator.exit_rate(*state) * (1.0_f64 - last_time) * length;
        }

        Ok(ln_probability)
    }
}

impl<M: MathsCore, R: RateGenerator> CharacterHistoryDistribution<M> for TreeHistoryCtmc<M, R> {
    type Tree = TimeTree;

    fn tree(&self) -> &Self::Tree {
        &self.tree
    }

    fn character_history(&self) -> &CharacterHistory {
        &self.history
    }

    fn character_history_mut(&mut self) -> &mut CharacterHistory {
        &mut self.history
    }

    fn tree_and_history_mut(&mut self) -> (&Self::Tree, &mut CharacterHistory) {
        (&self.tree, &mut self.history)
    }

    fn compute_ln_probability(&mut self) -> Result<LnProbability, LikelihoodError> {
        if self.history.num_states() != self.rate_generator.num_states() {
            return Err(LikelihoodError::DimensionMismatch {
                what: "character history states",
                expected: self.rate_generator.num_states(),
                found: self.history.num_states(),
            });
        }

        if !self.is_valid_history()? {
            return Ok(LnProbability::Impossible);
        }

        let frequencies = self.rate_generator.stationary_frequencies();

        let mut ln_probability: LnProbability = self
            .history
            .branch(self.tree.root())?
            .child_states()
            .iter()
            .map(|state| LnProbability::new(M::ln(frequencies[*state])))
            .sum();

        for node in 0..self.tree.num_nodes() {
            if !self.tree.is_root(node) {
                ln_probability += self.branch_ln_probability(node)?;
            }
        }

        Ok(ln_probability)
    }

    fn redraw_value<G: RngCore>(&mut self, rng: &mut G) -> Result<(), HistoryError> {
        self.history.set_tree(&self.tree);

        let sites: Vec<usize> = (0..self.history.num_sites()).collect();
        self.redraw_sites(rng, &sites)?;

        info!(
            "Redrew a character history with {} events across {} sites.",
            self.history.total_event_count(),
            sites.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core::{
        cogs::{CharacterHistoryDistribution, SeedableRng, Tree},
        history::CharacterEvent,
        probability::LnProbability,
    };
    use cladohist_core_bond::{OpenUnitF64, PositiveF64};
    use cladohist_core_maths::StdMathsCore;

    use crate::{
        cogs::{rate_generator::jukes_cantor::JukesCantor, rng::wyhash::WyHash},
        tree::TimeTree,
    };

    use super::TreeHistoryCtmc;

    fn ctmc(clock_rate: f64, num_sites: usize) -> TreeHistoryCtmc<StdMathsCore, JukesCantor> {
        let tree = TimeTree::from_parents(
            &[Some(3), Some(3), Some(4), Some(4), None],
            &[0.0_f64, 0.0_f64, 0.0_f64, 1.0_f64, 2.5_f64],
        )
        .unwrap();

        TreeHistoryCtmc::new(
            tree,
            JukesCantor::new(2).unwrap(),
            PositiveF64::new(clock_rate).unwrap(),
            num_sites,
        )
    }

    fn time(value: f64) -> OpenUnitF64 {
        OpenUnitF64::new(value).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-10_f64, "{a} != {b}");
    }

    #[test]
    fn constant_history_only_pays_the_waiting_time() {
        let mut process = ctmc(2.0_f64, 1);

        // Total tree length: 1 + 1 + 2.5 + 1.5
        assert_close(
            process.compute_ln_probability().unwrap().get(),
            0.5_f64.ln() - 2.0_f64 * 6.0_f64,
        );
    }

    #[test]
    fn events_pay_their_jump_rate() {
        let mut process = ctmc(2.0_f64, 1);

        let history = process.character_history_mut();
        history.new_event(0, 0, 1, time(0.25_f64)).unwrap();
        history.new_event(0, 0, 0, time(0.75_f64)).unwrap();

        assert!(history.is_consistent());

        assert_close(
            process.compute_ln_probability().unwrap().get(),
            0.5_f64.ln() - 2.0_f64 * 6.0_f64 + 2.0_f64 * 2.0_f64.ln(),
        );
    }

    #[test]
    fn inconsistent_histories_are_impossible() {
        let mut dangling = ctmc(1.0_f64, 1);
        dangling
            .character_history_mut()
            .new_event(2, 0, 1, time(0.5_f64))
            .unwrap();
        assert_eq!(
            dangling.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );

        let mut disconnected = ctmc(1.0_f64, 1);
        disconnected
            .character_history_mut()
            .branch_mut(3)
            .unwrap()
            .set_child_state(0, 1)
            .unwrap();
        disconnected
            .character_history_mut()
            .new_event(3, 0, 1, time(0.5_f64))
            .unwrap();
        assert_eq!(
            disconnected.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );

        let mut silent = ctmc(1.0_f64, 1);
        silent
            .character_history_mut()
            .new_event(1, 0, 0, time(0.5_f64))
            .unwrap();
        assert!(silent.character_history().is_consistent());
        assert_eq!(
            silent.compute_ln_probability(),
            Ok(LnProbability::Impossible)
        );
    }

    #[test]
    fn redrawn_histories_are_consistent() {
        let mut rng = WyHash::seed_from_u64(3);
        let mut process = ctmc(1.5_f64, 6);

        for _ in 0..8 {
            process.redraw_value(&mut rng).unwrap();

            assert!(process.character_history().is_consistent());
            assert!(process
                .character_history()
                .iter()
                .all(|branch| branch.is_time_ordered()));
            assert!(!process.compute_ln_probability().unwrap().is_impossible());
        }
    }

    #[test]
    fn redrawing_sites_keeps_the_other_sites() {
        let mut rng = WyHash::seed_from_u64(11);
        let mut process = ctmc(3.0_f64, 4);
        process.redraw_value(&mut rng).unwrap();

        let site_events = |process: &TreeHistoryCtmc<StdMathsCore, JukesCantor>, site: usize| {
            process
                .character_history()
                .iter()
                .map(|branch| {
                    branch
                        .events_for_site(site)
                        .cloned()
                        .collect::<Vec<CharacterEvent>>()
                })
                .collect::<Vec<_>>()
        };

        let kept = site_events(&process, 2);

        process.redraw_sites(&mut rng, &[0, 3]).unwrap();

        assert_eq!(site_events(&process, 2), kept);
        assert!(process.character_history().is_consistent());
        assert!(!process.compute_ln_probability().unwrap().is_impossible());

        assert!(process.redraw_sites(&mut rng, &[4]).is_err());
    }

    #[test]
    fn root_states_follow_the_tree() {
        let mut rng = WyHash::seed_from_u64(17);
        let mut process = ctmc(1.0_f64, 3);
        process.redraw_value(&mut rng).unwrap();

        let root = process.tree().root();
        let root_states = process
            .character_history()
            .branch(root)
            .unwrap()
            .child_states()
            .to_vec();

        for child in process.tree().children(root) {
            assert_eq!(
                process.character_history().branch(*child).unwrap().parent_states(),
                root_states.as_slice()
            );
        }
    }
}
