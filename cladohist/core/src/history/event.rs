use core::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use cladohist_core_bond::OpenUnitF64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EventId(u64);

impl EventId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{}", self.0)
    }
}

/// A change of one site to `state` at the branch-relative `time`, where 0 is
/// the parent end and 1 the child end of the branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct CharacterEvent {
    id: EventId,
    site_index: usize,
    state: usize,
    time: OpenUnitF64,
}

impl CharacterEvent {
    #[must_use]
    pub const fn new(id: EventId, site_index: usize, state: usize, time: OpenUnitF64) -> Self {
        Self {
            id,
            site_index,
            state,
            time,
        }
    }

    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub const fn site_index(&self) -> usize {
        self.site_index
    }

    #[must_use]
    pub const fn state(&self) -> usize {
        self.state
    }

    #[must_use]
    pub const fn time(&self) -> OpenUnitF64 {
        self.time
    }

    pub fn set_state(&mut self, state: usize) {
        self.state = state;
    }

    pub fn set_time(&mut self, time: OpenUnitF64) {
        self.time = time;
    }

    /// Orders events by time only. Equal times compare equal, so the
    /// insertion order decides between them.
    #[must_use]
    pub fn cmp_time(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}
