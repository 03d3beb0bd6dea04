use crate::history::EventId;

#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// event {0} is not present on branch {1}
    EventNotFound(EventId, usize),
    /// branch {branch} is out of range for a history with {num_branches} branch slots
    BranchOutOfRange { branch: usize, num_branches: usize },
    /// site {site} is out of range for {num_sites} sites
    SiteOutOfRange { site: usize, num_sites: usize },
    /// state {state} is out of range for {num_states} states
    StateOutOfRange { state: usize, num_states: usize },
    /// boundary state vector has length {found} but {expected} sites are required
    BoundaryLength { expected: usize, found: usize },
}

#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, PartialEq)]
pub enum LikelihoodError {
    /// branch {0} carries events but the cladogenetic event map is empty
    EmptyEventMap(usize),
    /// cladogenetic node {node} has {children} children instead of two
    NonBifurcating { node: usize, children: usize },
    /// no observed data for tip {0}
    MissingTipData(usize),
    /// tip {tip} has {found} characters but {expected} were expected
    MalformedTipData {
        tip: usize,
        expected: usize,
        found: usize,
    },
    /// {what} has dimension {found} but {expected} was expected
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// tip {tip} observes state {state} outside of the {num_states} model states
    StateOutOfRange {
        tip: usize,
        state: usize,
        num_states: usize,
    },
    /// no cladogenetic event map is available for node {0}
    MissingEventMap(usize),
    /// marginal likelihoods were requested before the partial likelihoods were computed
    PartialsNotComputed,
    /// invalid character history: {0}
    History(#[from] HistoryError),
}

#[derive(thiserror::Error, displaydoc::Display, Debug, Clone, PartialEq)]
pub enum ProposalError {
    /// {0} cannot be undone as no proposal is pending
    NothingToUndo(&'static str),
    /// the proposal left the character history inconsistent: {0}
    History(#[from] HistoryError),
}
