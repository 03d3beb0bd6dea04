use core::fmt;

use cladohist_core_bond::ClosedUnitF64;

use crate::{
    cogs::{CharacterHistoryDistribution, MathsCore, RngCore},
    error::ProposalError,
};

/// A Metropolis-Hastings move on the character history of a distribution.
///
/// A move is prepared, proposed, and then either accepted with
/// [`Proposal::clean_proposal`] or rejected with [`Proposal::undo_proposal`].
pub trait Proposal<M: MathsCore, D: CharacterHistoryDistribution<M>>: fmt::Debug {
    #[must_use]
    fn name(&self) -> &'static str;

    fn prepare(&mut self, distribution: &D);

    /// Returns the log Hastings ratio of the proposed change.
    ///
    /// # Errors
    ///
    /// Returns `ProposalError` if the character history could not be
    /// updated. A proposal that is merely impossible instead reports
    /// [`Proposal::failed`] with a ratio of zero.
    fn do_proposal<G: RngCore>(
        &mut self,
        distribution: &mut D,
        rng: &mut G,
    ) -> Result<f64, ProposalError>;

    /// # Errors
    ///
    /// Returns `ProposalError` if there is nothing to undo or the history
    /// could not be restored.
    fn undo_proposal(&mut self, distribution: &mut D) -> Result<(), ProposalError>;

    fn clean_proposal(&mut self);

    fn tune(&mut self, acceptance_rate: ClosedUnitF64);

    /// # Errors
    ///
    /// Returns `fmt::Error` if writing to `out` fails.
    fn print_parameter_summary(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    #[must_use]
    fn failed(&self) -> bool;
}
