use serde::{Deserialize, Serialize};

use cladohist_core_bond::OpenUnitF64;

use crate::{
    cogs::{RngCore, RngSampler, Tree},
    error::HistoryError,
};

use super::{BranchHistory, CharacterEvent, EventId};

/// The character histories along all branches of a tree.
///
/// Branch slots are indexed by the index of the node below the branch. The
/// root's slot only holds a history if the synthetic root branch is enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct CharacterHistory {
    branches: Vec<BranchHistory>,
    total_event_count: usize,
    num_sites: usize,
    num_states: usize,
    root_index: usize,
    use_root_branch: bool,
    next_event_id: u64,
}

impl CharacterHistory {
    #[must_use]
    pub fn new<T: Tree>(
        tree: &T,
        num_sites: usize,
        num_states: usize,
        use_root_branch: bool,
    ) -> Self {
        let mut history = Self {
            branches: Vec::new(),
            total_event_count: 0,
            num_sites,
            num_states,
            root_index: tree.root(),
            use_root_branch,
            next_event_id: 0,
        };

        history.set_tree(tree);

        history
    }

    /// Discards all branch histories and rebuilds empty ones for `tree`.
    #[debug_ensures(self.total_event_count == 0)]
    pub fn set_tree<T: Tree>(&mut self, tree: &T) {
        self.root_index = tree.root();
        self.branches = (0..tree.num_nodes())
            .map(|branch| BranchHistory::new(branch, self.num_sites, self.num_states))
            .collect();
        self.total_event_count = 0;
    }

    #[must_use]
    pub const fn num_sites(&self) -> usize {
        self.num_sites
    }

    #[must_use]
    pub const fn num_states(&self) -> usize {
        self.num_states
    }

    #[must_use]
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    #[must_use]
    pub const fn root_index(&self) -> usize {
        self.root_index
    }

    #[must_use]
    pub const fn has_root_branch(&self) -> bool {
        self.use_root_branch
    }

    #[must_use]
    pub const fn total_event_count(&self) -> usize {
        self.total_event_count
    }

    fn check_branch(&self, branch: usize) -> Result<(), HistoryError> {
        if branch < self.branches.len() && (branch != self.root_index || self.use_root_branch) {
            Ok(())
        } else {
            Err(HistoryError::BranchOutOfRange {
                branch,
                num_branches: self.branches.len(),
            })
        }
    }

    /// # Errors
    ///
    /// Returns `HistoryError::BranchOutOfRange` if `branch` is not an
    /// accessible branch slot.
    pub fn branch(&self, branch: usize) -> Result<&BranchHistory, HistoryError> {
        self.check_branch(branch)?;
        Ok(&self.branches[branch])
    }

    /// Mutable access to the boundary states of a branch. Events can only
    /// be changed through the [`CharacterHistory`] so that the total event
    /// count stays correct.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::BranchOutOfRange` if `branch` is not an
    /// accessible branch slot.
    pub fn branch_mut(&mut self, branch: usize) -> Result<BranchBoundaryMut<'_>, HistoryError> {
        self.check_branch(branch)?;
        Ok(BranchBoundaryMut(&mut self.branches[branch]))
    }

    /// Iterates over all accessible branch histories.
    pub fn iter(&self) -> impl Iterator<Item = &BranchHistory> {
        let (root_index, use_root_branch) = (self.root_index, self.use_root_branch);

        self.branches
            .iter()
            .filter(move |branch| use_root_branch || branch.branch_index() != root_index)
    }

    #[must_use]
    pub fn num_events_per_branch(&self) -> Vec<usize> {
        self.branches.iter().map(BranchHistory::num_events).collect()
    }

    /// Allocates a fresh, history-unique event id.
    pub fn allocate_event_id(&mut self) -> EventId {
        let id = EventId::new(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `branch` is inaccessible or the event is out
    /// of range.
    #[debug_ensures(ret.is_err() || self.total_event_count == old(self.total_event_count) + 1)]
    pub fn add_event(&mut self, branch: usize, event: CharacterEvent) -> Result<(), HistoryError> {
        self.check_branch(branch)?;

        if event.id().get() >= self.next_event_id {
            self.next_event_id = event.id().get() + 1;
        }

        self.branches[branch].add_event(event)?;
        self.total_event_count += 1;

        Ok(())
    }

    /// Creates a new event with a fresh id on `branch`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if `branch` is inaccessible or `site` or
    /// `state` is out of range.
    pub fn new_event(
        &mut self,
        branch: usize,
        site: usize,
        state: usize,
        time: OpenUnitF64,
    ) -> Result<EventId, HistoryError> {
        self.check_branch(branch)?;

        let id = self.allocate_event_id();
        self.add_event(branch, CharacterEvent::new(id, site, state, time))?;

        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `branch` is inaccessible or does not carry
    /// the event.
    #[debug_ensures(ret.is_err() || self.total_event_count + 1 == old(self.total_event_count))]
    pub fn remove_event(
        &mut self,
        branch: usize,
        id: EventId,
    ) -> Result<CharacterEvent, HistoryError> {
        self.check_branch(branch)?;

        let event = self.branches[branch].remove_event(id)?;
        self.total_event_count -= 1;

        Ok(event)
    }

    /// Replaces the events of the given `sites` on `branch` by `new_events`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if `branch` is inaccessible or any site or new
    /// event is out of range. The history is unchanged on error.
    pub fn replace_events(
        &mut self,
        branch: usize,
        sites: &[usize],
        new_events: Vec<CharacterEvent>,
    ) -> Result<(), HistoryError> {
        self.check_branch(branch)?;

        let max_id = new_events.iter().map(|event| event.id().get()).max();
        let num_added = new_events.len();
        let num_removed = self.branches[branch].replace_events(sites, new_events)?;

        if let Some(max_id) = max_id {
            self.next_event_id = self.next_event_id.max(max_id + 1);
        }

        self.total_event_count = self.total_event_count + num_added - num_removed;

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `HistoryError::BranchOutOfRange` if `branch` is inaccessible.
    pub fn clear_events(&mut self, branch: usize) -> Result<(), HistoryError> {
        self.check_branch(branch)?;

        self.total_event_count -= self.branches[branch].clear_events();

        Ok(())
    }

    /// Finds the branch that currently carries the event with `id`.
    #[must_use]
    pub fn find_event(&self, id: EventId) -> Option<(usize, &CharacterEvent)> {
        self.iter()
            .find_map(|branch| branch.event(id).map(|event| (branch.branch_index(), event)))
    }

    /// Picks an event uniformly at random over all branches, returning its
    /// branch and id, or `None` if the history has no events.
    #[must_use]
    pub fn pick_random_event<G: RngCore>(&self, rng: &mut G) -> Option<(usize, EventId)> {
        if self.total_event_count == 0 {
            return None;
        }

        let mut remaining = rng.sample_index(self.total_event_count);

        for branch in self.iter() {
            if remaining < branch.num_events() {
                return Some((branch.branch_index(), branch.events()[remaining].id()));
            }

            remaining -= branch.num_events();
        }

        None
    }

    /// Checks that every branch replays its events from its parent to its
    /// child states and that the event count is up to date.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.iter().all(BranchHistory::is_consistent)
            && self.branches.iter().map(BranchHistory::num_events).sum::<usize>()
                == self.total_event_count
    }
}

/// Boundary-state access to a single branch of a [`CharacterHistory`].
pub struct BranchBoundaryMut<'h>(&'h mut BranchHistory);

impl<'h> BranchBoundaryMut<'h> {
    #[must_use]
    pub fn branch(&self) -> &BranchHistory {
        self.0
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `states` has the wrong length or contains
    /// an out-of-range state.
    pub fn set_parent_states(&mut self, states: Vec<usize>) -> Result<(), HistoryError> {
        self.0.set_parent_states(states)
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `states` has the wrong length or contains
    /// an out-of-range state.
    pub fn set_child_states(&mut self, states: Vec<usize>) -> Result<(), HistoryError> {
        self.0.set_child_states(states)
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `site` or `state` is out of range.
    pub fn set_parent_state(&mut self, site: usize, state: usize) -> Result<(), HistoryError> {
        self.0.set_parent_state(site, state)
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `site` or `state` is out of range.
    pub fn set_child_state(&mut self, site: usize, state: usize) -> Result<(), HistoryError> {
        self.0.set_child_state(site, state)
    }
}
