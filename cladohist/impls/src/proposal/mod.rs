use core::fmt;

use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, Proposal, RngCore},
    error::ProposalError,
    history::{CharacterEvent, EventId},
};
use cladohist_core_bond::{ClosedUnitF64, OpenUnitF64};

pub mod beta_time;
pub mod slide_time;


use beta_time::EventTimeBetaProposal;
use slide_time::EventTimeSlideProposal;

/// The acceptance rate that tuning aims for.
const TARGET_ACCEPTANCE_RATE: f64 = 0.44_f64;

/// What is needed to move a proposed event back to where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEvent {
    event_id: EventId,
    original_branch: usize,
    original_time: OpenUnitF64,
    proposed_branch: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProposalState {
    #[default]
    Idle,
    Prepared,
    Proposed(StoredEvent),
    Failed,
}

/// Picks an event uniformly at random, returning its branch and a copy of
/// it without modifying the history.
fn pick_event<M: MathsCore, D: CharacterHistoryDistribution<M>, G: RngCore>(
    distribution: &D,
    rng: &mut G,
) -> Option<(usize, CharacterEvent)> {
    let history = distribution.character_history();

    let (branch, id) = history.pick_random_event(rng)?;
    let event = history.branch(branch).ok()?.event(id)?.clone();

    Some((branch, event))
}

/// Moves `event` from `original_branch` to `proposed_branch` at the
/// `proposed_time`, returning the undo information.
fn move_event<M: MathsCore, D: CharacterHistoryDistribution<M>>(
    distribution: &mut D,
    event: &CharacterEvent,
    original_branch: usize,
    proposed_branch: usize,
    proposed_time: OpenUnitF64,
) -> Result<StoredEvent, ProposalError> {
    let history = distribution.character_history_mut();

    let mut moved = history.remove_event(original_branch, event.id())?;
    moved.set_time(proposed_time);
    history.add_event(proposed_branch, moved)?;

    distribution.touch_branch(original_branch);
    distribution.touch_branch(proposed_branch);

    Ok(StoredEvent {
        event_id: event.id(),
        original_branch,
        original_time: event.time(),
        proposed_branch,
    })
}

/// Restores the event of a pending proposal.
fn undo_stored<M: MathsCore, D: CharacterHistoryDistribution<M>>(
    state: &mut ProposalState,
    distribution: &mut D,
    name: &'static str,
) -> Result<(), ProposalError> {
    let stored = match core::mem::take(state) {
        ProposalState::Proposed(stored) => stored,
        // A failed proposal has already restored the history
        ProposalState::Failed => return Ok(()),
        ProposalState::Idle | ProposalState::Prepared => {
            return Err(ProposalError::NothingToUndo(name))
        },
    };

    let history = distribution.character_history_mut();

    let mut event = history.remove_event(stored.proposed_branch, stored.event_id)?;
    event.set_time(stored.original_time);
    history.add_event(stored.original_branch, event)?;

    distribution.touch_branch(stored.proposed_branch);
    distribution.touch_branch(stored.original_branch);

    debug!(
        "{name}: restored event {} on branch {}.",
        stored.event_id, stored.original_branch
    );

    Ok(())
}

/// The multiplicative tuning step for an `acceptance_rate`, greater than one
/// if the rate is above the target. It is continuous at the target.
fn tuning_factor(acceptance_rate: ClosedUnitF64) -> f64 {
    let rate = acceptance_rate.get();

    if rate > TARGET_ACCEPTANCE_RATE {
        1.0_f64 + (rate - TARGET_ACCEPTANCE_RATE) / (1.0_f64 - TARGET_ACCEPTANCE_RATE)
    } else {
        1.0_f64 / (2.0_f64 - rate / TARGET_ACCEPTANCE_RATE)
    }
}

/// The closed set of event-time proposals that can be selected by
/// configuration.
#[derive(Clone, Debug)]
pub enum AnyEventTimeProposal {
    Beta(EventTimeBetaProposal),
    Slide(EventTimeSlideProposal),
}

impl<M: MathsCore, D: CharacterHistoryDistribution<M>> Proposal<M, D> for AnyEventTimeProposal {
    fn name(&self) -> &'static str {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::name(proposal),
            Self::Slide(proposal) => Proposal::<M, D>::name(proposal),
        }
    }

    fn prepare(&mut self, distribution: &D) {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::prepare(proposal, distribution),
            Self::Slide(proposal) => Proposal::<M, D>::prepare(proposal, distribution),
        }
    }

    fn do_proposal<G: RngCore>(
        &mut self,
        distribution: &mut D,
        rng: &mut G,
    ) -> Result<f64, ProposalError> {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::do_proposal(proposal, distribution, rng),
            Self::Slide(proposal) => Proposal::<M, D>::do_proposal(proposal, distribution, rng),
        }
    }

    fn undo_proposal(&mut self, distribution: &mut D) -> Result<(), ProposalError> {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::undo_proposal(proposal, distribution),
            Self::Slide(proposal) => Proposal::<M, D>::undo_proposal(proposal, distribution),
        }
    }

    fn clean_proposal(&mut self) {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::clean_proposal(proposal),
            Self::Slide(proposal) => Proposal::<M, D>::clean_proposal(proposal),
        }
    }

    fn tune(&mut self, acceptance_rate: ClosedUnitF64) {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::tune(proposal, acceptance_rate),
            Self::Slide(proposal) => Proposal::<M, D>::tune(proposal, acceptance_rate),
        }
    }

    fn print_parameter_summary(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::print_parameter_summary(proposal, out),
            Self::Slide(proposal) => Proposal::<M, D>::print_parameter_summary(proposal, out),
        }
    }

    fn failed(&self) -> bool {
        match self {
            Self::Beta(proposal) => Proposal::<M, D>::failed(proposal),
            Self::Slide(proposal) => Proposal::<M, D>::failed(proposal),
        }
    }
}

impl From<EventTimeBetaProposal> for AnyEventTimeProposal {
    fn from(proposal: EventTimeBetaProposal) -> Self {
        Self::Beta(proposal)
    }
}

impl From<EventTimeSlideProposal> for AnyEventTimeProposal {
    fn from(proposal: EventTimeSlideProposal) -> Self {
        Self::Slide(proposal)
    }
}
