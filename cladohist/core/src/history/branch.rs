use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

use super::{CharacterEvent, EventId};

/// The character events along a single branch, ordered by time, together
/// with the states at both ends of the branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct BranchHistory {
    branch_index: usize,
    num_sites: usize,
    num_states: usize,
    events: Vec<CharacterEvent>,
    parent_states: Vec<usize>,
    child_states: Vec<usize>,
}

impl BranchHistory {
    #[must_use]
    pub fn new(branch_index: usize, num_sites: usize, num_states: usize) -> Self {
        Self {
            branch_index,
            num_sites,
            num_states,
            events: Vec::new(),
            parent_states: vec![0; num_sites],
            child_states: vec![0; num_sites],
        }
    }

    #[must_use]
    pub const fn branch_index(&self) -> usize {
        self.branch_index
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
    pub fn events(&self) -> &[CharacterEvent] {
        &self.events
    }

    #[must_use]
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    #[must_use]
    pub fn parent_states(&self) -> &[usize] {
        &self.parent_states
    }

    #[must_use]
    pub fn child_states(&self) -> &[usize] {
        &self.child_states
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&CharacterEvent> {
        self.events.iter().find(|event| event.id() == id)
    }

    pub fn events_for_site(&self, site: usize) -> impl Iterator<Item = &CharacterEvent> {
        self.events
            .iter()
            .filter(move |event| event.site_index() == site)
    }

    /// # Errors
    ///
    /// Returns `HistoryError::SiteOutOfRange` if `site` is out of range.
    pub fn check_site(&self, site: usize) -> Result<(), HistoryError> {
        if site < self.num_sites {
            Ok(())
        } else {
            Err(HistoryError::SiteOutOfRange {
                site,
                num_sites: self.num_sites,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `HistoryError::StateOutOfRange` if `state` is out of range.
    pub fn check_state(&self, state: usize) -> Result<(), HistoryError> {
        if state < self.num_states {
            Ok(())
        } else {
            Err(HistoryError::StateOutOfRange {
                state,
                num_states: self.num_states,
            })
        }
    }

    fn check_event(&self, event: &CharacterEvent) -> Result<(), HistoryError> {
        self.check_site(event.site_index())?;
        self.check_state(event.state())
    }

    fn check_boundary(&self, states: &[usize]) -> Result<(), HistoryError> {
        if states.len() != self.num_sites {
            return Err(HistoryError::BoundaryLength {
                expected: self.num_sites,
                found: states.len(),
            });
        }

        states
            .iter()
            .try_for_each(|state| self.check_state(*state))
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `states` has the wrong length or contains
    /// an out-of-range state.
    pub fn set_parent_states(&mut self, states: Vec<usize>) -> Result<(), HistoryError> {
        self.check_boundary(&states)?;
        self.parent_states = states;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `states` has the wrong length or contains
    /// an out-of-range state.
    pub fn set_child_states(&mut self, states: Vec<usize>) -> Result<(), HistoryError> {
        self.check_boundary(&states)?;
        self.child_states = states;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `site` or `state` is out of range.
    pub fn set_parent_state(&mut self, site: usize, state: usize) -> Result<(), HistoryError> {
        self.check_site(site)?;
        self.check_state(state)?;
        self.parent_states[site] = state;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `HistoryError` if `site` or `state` is out of range.
    pub fn set_child_state(&mut self, site: usize, state: usize) -> Result<(), HistoryError> {
        self.check_site(site)?;
        self.check_state(state)?;
        self.child_states[site] = state;
        Ok(())
    }

    /// Inserts `event` after all events with a smaller or equal time.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if the event's site or state is out of range.
    pub fn add_event(&mut self, event: CharacterEvent) -> Result<(), HistoryError> {
        self.check_event(&event)?;
        self.insert_sorted(event);
        Ok(())
    }

    fn insert_sorted(&mut self, event: CharacterEvent) {
        let position = self
            .events
            .partition_point(|other| other.time() <= event.time());

        self.events.insert(position, event);
    }

    /// # Errors
    ///
    /// Returns `HistoryError::EventNotFound` if no event with `id` lies on
    /// this branch.
    pub fn remove_event(&mut self, id: EventId) -> Result<CharacterEvent, HistoryError> {
        let position = self
            .events
            .iter()
            .position(|event| event.id() == id)
            .ok_or(HistoryError::EventNotFound(id, self.branch_index))?;

        self.remove_event_at(position)
            .ok_or(HistoryError::EventNotFound(id, self.branch_index))
    }

    /// Removes the event at `position` in time order.
    pub fn remove_event_at(&mut self, position: usize) -> Option<CharacterEvent> {
        if position < self.events.len() {
            Some(self.events.remove(position))
        } else {
            None
        }
    }

    /// Removes all events whose site is in `sites` and inserts `new_events`
    /// in their place. Returns the number of removed events.
    ///
    /// Nothing is modified if any of the new events is invalid.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if a site in `sites` or any new event is out of
    /// range.
    pub fn replace_events(
        &mut self,
        sites: &[usize],
        new_events: Vec<CharacterEvent>,
    ) -> Result<usize, HistoryError> {
        sites.iter().try_for_each(|site| self.check_site(*site))?;
        new_events
            .iter()
            .try_for_each(|event| self.check_event(event))?;

        let num_events_before = self.events.len();
        self.events
            .retain(|event| !sites.contains(&event.site_index()));
        let num_removed = num_events_before - self.events.len();

        for event in new_events {
            self.insert_sorted(event);
        }

        Ok(num_removed)
    }

    /// Removes all events, returning how many were removed.
    pub fn clear_events(&mut self) -> usize {
        let num_removed = self.events.len();
        self.events.clear();
        num_removed
    }

    /// The state of `site` at the relative `time`, including any event at
    /// exactly `time`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::SiteOutOfRange` if `site` is out of range.
    pub fn state_at(&self, site: usize, time: f64) -> Result<usize, HistoryError> {
        self.check_site(site)?;

        Ok(self
            .events_for_site(site)
            .take_while(|event| event.time().get() <= time)
            .last()
            .map_or(self.parent_states[site], CharacterEvent::state))
    }

    /// Checks that replaying the events of every site on top of the parent
    /// states yields the child states.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut states = self.parent_states.clone();

        for event in &self.events {
            states[event.site_index()] = event.state();
        }

        states == self.child_states
    }

    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].time() <= pair[1].time())
    }
}
