use core::fmt;

use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, Proposal, RngCore, RngSampler},
    error::ProposalError,
};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, OpenUnitF64, PositiveF64};
use cladohist_core_maths::ln_beta_pdf;

use super::{move_event, pick_event, tuning_factor, undo_stored, ProposalState};

/// Redraws the relative time of a random event from a Beta distribution
/// centred on its current time. The event stays on its branch.
///
/// Larger `delta`s concentrate the proposal around the current time.
#[derive(Clone, Debug)]
pub struct EventTimeBetaProposal {
    delta: PositiveF64,
    offset: NonNegativeF64,
    state: ProposalState,
}

impl EventTimeBetaProposal {
    #[must_use]
    pub fn new(delta: PositiveF64, offset: NonNegativeF64) -> Self {
        Self {
            delta,
            offset,
            state: ProposalState::Idle,
        }
    }

    #[must_use]
    pub fn delta(&self) -> PositiveF64 {
        self.delta
    }

    #[must_use]
    pub fn offset(&self) -> NonNegativeF64 {
        self.offset
    }

    #[must_use]
    pub fn state(&self) -> &ProposalState {
        &self.state
    }

    /// The Beta shape parameters centred on the relative `time`.
    fn shapes(&self, time: OpenUnitF64) -> (PositiveF64, PositiveF64) {
        let delta = self.delta.get();
        let offset = self.offset.get();

        // Both shapes are positive as delta is positive and time is in (0, 1)
        let alpha = PositiveF64::new(delta * time.get() + offset).unwrap_or(self.delta);
        let beta = PositiveF64::new(delta * time.one_minus().get() + offset).unwrap_or(self.delta);

        (alpha, beta)
    }

    fn fail(&mut self, reason: &str) -> f64 {
        debug!("EventTimeBeta: {reason}.");

        self.state = ProposalState::Failed;

        0.0_f64
    }
}

impl<M: MathsCore, D: CharacterHistoryDistribution<M>> Proposal<M, D> for EventTimeBetaProposal {
    fn name(&self) -> &'static str {
        "EventTimeBeta"
    }

    fn prepare(&mut self, _distribution: &D) {
        self.state = ProposalState::Prepared;
    }

    fn do_proposal<G: RngCore>(
        &mut self,
        distribution: &mut D,
        rng: &mut G,
    ) -> Result<f64, ProposalError> {
        let Some((branch, event)) = pick_event::<M, D, G>(distribution, rng) else {
            return Ok(self.fail("the history has no events"));
        };

        let old_time = event.time();
        let (alpha, beta) = self.shapes(old_time);

        let Ok(new_time) = OpenUnitF64::new(rng.sample_beta::<M>(alpha, beta)) else {
            return Ok(self.fail("the new time rounded onto the branch boundary"));
        };

        let (reverse_alpha, reverse_beta) = self.shapes(new_time);

        let ln_hastings_ratio =
            ln_beta_pdf::<M>(reverse_alpha.get(), reverse_beta.get(), old_time.get())
                - ln_beta_pdf::<M>(alpha.get(), beta.get(), new_time.get());

        let stored = move_event::<M, D>(distribution, &event, branch, branch, new_time)?;

        debug!(
            "EventTimeBeta: moved event {} on branch {branch} from {} to {}.",
            event.id(),
            old_time.get(),
            new_time.get()
        );

        self.state = ProposalState::Proposed(stored);

        Ok(ln_hastings_ratio)
    }

    fn undo_proposal(&mut self, distribution: &mut D) -> Result<(), ProposalError> {
        undo_stored::<M, D>(&mut self.state, distribution, "EventTimeBeta")
    }

    fn clean_proposal(&mut self) {
        self.state = ProposalState::Idle;
    }

    fn tune(&mut self, acceptance_rate: ClosedUnitF64) {
        if let Ok(delta) = PositiveF64::new(self.delta.get() / tuning_factor(acceptance_rate)) {
            debug!(
                "EventTimeBeta: tuned delta from {} to {} at acceptance rate {}.",
                self.delta.get(),
                delta.get(),
                acceptance_rate.get()
            );

            self.delta = delta;
        }
    }

    fn print_parameter_summary(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            out,
            "delta = {}\toffset = {}",
            self.delta.get(),
            self.offset.get()
        )
    }

    fn failed(&self) -> bool {
        matches!(self.state, ProposalState::Failed)
    }
}
