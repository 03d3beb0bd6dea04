use core::fmt;

use serde::{Deserialize, Serialize};

use cladohist_core::{
    cogs::{CharacterHistoryDistribution, MathsCore, Proposal, RngCore, RngSampler, Tree},
    error::ProposalError,
};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, OpenUnitF64, PositiveF64};

use super::{move_event, pick_event, tuning_factor, undo_stored, ProposalState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideMode {
    /// Reflect at both ends of the event's branch
    #[default]
    WithinBranch,
    /// Continue into the neighbouring branches, reflecting only at the root
    /// and at the tips
    AcrossBranches,
}

/// Slides a random event by a normally distributed absolute offset.
#[derive(Clone, Debug)]
pub struct EventTimeSlideProposal {
    delta: PositiveF64,
    mode: SlideMode,
    state: ProposalState,
}

/// Where a slide ends up, with its log Hastings ratio.
struct Landing {
    branch: usize,
    time: OpenUnitF64,
    ln_hastings_ratio: f64,
}

impl EventTimeSlideProposal {
    #[must_use]
    pub fn new(delta: PositiveF64, mode: SlideMode) -> Self {
        Self {
            delta,
            mode,
            state: ProposalState::Idle,
        }
    }

    #[must_use]
    pub fn delta(&self) -> PositiveF64 {
        self.delta
    }

    #[must_use]
    pub fn mode(&self) -> SlideMode {
        self.mode
    }

    #[must_use]
    pub fn state(&self) -> &ProposalState {
        &self.state
    }

    fn fail(&mut self, reason: &str) -> f64 {
        debug!("EventTimeSlide: {reason}.");

        self.state = ProposalState::Failed;

        0.0_f64
    }
}

/// Reflects the absolute `position` at both ends of a branch of `length`.
fn slide_within_branch<T: Tree>(
    tree: &T,
    branch: usize,
    position: f64,
) -> Option<Landing> {
    let length = tree.branch_length(branch);

    if length <= 0.0_f64 || !position.is_finite() {
        return None;
    }

    let folded = position.rem_euclid(2.0_f64 * length);
    let reflected = if folded > length {
        2.0_f64 * length - folded
    } else {
        folded
    };

    Some(Landing {
        branch,
        time: OpenUnitF64::new(reflected / length).ok()?,
        ln_hastings_ratio: 0.0_f64,
    })
}

/// Follows the absolute `position` through the tree, descending into a
/// uniformly chosen child below a node and ascending into the parent branch
/// above it. The root and the tips reflect.
fn slide_across_branches<M: MathsCore, T: Tree, G: RngCore>(
    tree: &T,
    mut branch: usize,
    mut position: f64,
    rng: &mut G,
) -> Option<Landing> {
    let mut ln_hastings_ratio = 0.0_f64;

    loop {
        let length = tree.branch_length(branch);

        if length <= 0.0_f64 || !position.is_finite() {
            return None;
        }

        if position > 0.0_f64 && position < length {
            return Some(Landing {
                branch,
                time: OpenUnitF64::new(position / length).ok()?,
                ln_hastings_ratio,
            });
        }

        if position < 0.0_f64 {
            let parent = tree.parent(branch)?;

            if tree.is_root(parent) {
                // Reflect at the root into any of its children
                let children = tree.children(parent);

                branch = children[rng.sample_index(children.len())];
                position = -position;
            } else {
                #[allow(clippy::cast_precision_loss)]
                let num_children = tree.children(parent).len() as f64;

                ln_hastings_ratio -= M::ln(num_children);

                branch = parent;
                position += tree.branch_length(parent);
            }
        } else if position > length {
            let children = tree.children(branch);

            if children.is_empty() {
                position = 2.0_f64 * length - position;
            } else {
                #[allow(clippy::cast_precision_loss)]
                let num_children = children.len() as f64;

                ln_hastings_ratio += M::ln(num_children);

                position -= length;
                branch = children[rng.sample_index(children.len())];
            }
        } else {
            // Landed exactly on a node
            return None;
        }
    }
}

impl<M: MathsCore, D: CharacterHistoryDistribution<M>> Proposal<M, D> for EventTimeSlideProposal {
    fn name(&self) -> &'static str {
        "EventTimeSlide"
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

        let tree = distribution.tree();

        let offset = rng.sample_normal::<M>(0.0_f64, NonNegativeF64::from(self.delta));
        let position = event.time().get() * tree.branch_length(branch) + offset;

        let landing = match self.mode {
            SlideMode::WithinBranch => slide_within_branch(tree, branch, position),
            SlideMode::AcrossBranches => {
                slide_across_branches::<M, D::Tree, G>(tree, branch, position, rng)
            },
        };

        let Some(landing) = landing else {
            return Ok(self.fail("the event landed on a node or a zero-length branch"));
        };

        let stored = move_event::<M, D>(distribution, &event, branch, landing.branch, landing.time)?;

        debug!(
            "EventTimeSlide: moved event {} from {} on branch {branch} to {} on branch {}.",
            event.id(),
            event.time().get(),
            landing.time.get(),
            landing.branch
        );

        self.state = ProposalState::Proposed(stored);

        Ok(landing.ln_hastings_ratio)
    }

    fn undo_proposal(&mut self, distribution: &mut D) -> Result<(), ProposalError> {
        undo_stored::<M, D>(&mut self.state, distribution, "EventTimeSlide")
    }

    fn clean_proposal(&mut self) {
        self.state = ProposalState::Idle;
    }

    fn tune(&mut self, acceptance_rate: ClosedUnitF64) {
        if let Ok(delta) = PositiveF64::new(self.delta.get() * tuning_factor(acceptance_rate)) {
            debug!(
                "EventTimeSlide: tuned delta from {} to {} at acceptance rate {}.",
                self.delta.get(),
                delta.get(),
                acceptance_rate.get()
            );

            self.delta = delta;
        }
    }

    fn print_parameter_summary(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "delta = {}", self.delta.get())
    }

    fn failed(&self) -> bool {
        matches!(self.state, ProposalState::Failed)
    }
}
