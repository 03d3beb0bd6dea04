use crate::{
    cogs::{MathsCore, RngCore, Tree},
    error::{HistoryError, LikelihoodError},
    history::CharacterHistory,
    probability::LnProbability,
};

/// A probability distribution over trees that carries a character history
/// along its branches.
pub trait CharacterHistoryDistribution<M: MathsCore>: core::fmt::Debug {
    type Tree: Tree;

    #[must_use]
    fn tree(&self) -> &Self::Tree;

    #[must_use]
    fn character_history(&self) -> &CharacterHistory;

    #[must_use]
    fn character_history_mut(&mut self) -> &mut CharacterHistory;

    #[must_use]
    fn tree_and_history_mut(&mut self) -> (&Self::Tree, &mut CharacterHistory);

    /// # Errors
    ///
    /// Returns `LikelihoodError` if the tree or history violates a structural
    /// precondition. Statistically impossible states are reported as
    /// [`LnProbability::Impossible`] instead.
    fn compute_ln_probability(&mut self) -> Result<LnProbability, LikelihoodError>;

    /// Draws a new value, i.e. a new tree and/or character history, from the
    /// distribution.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if the redrawn history cannot be stored.
    fn redraw_value<G: RngCore>(&mut self, rng: &mut G) -> Result<(), HistoryError>;

    /// Marks the branch above `branch` as changed.
    fn touch_branch(&mut self, _branch: usize) {}
}
