use serde::{Deserialize, Serialize};

use cladohist_core_bond::{NonNegativeF64, PositiveF64};
use cladohist_impls::proposal::{
    beta_time::EventTimeBetaProposal,
    slide_time::{EventTimeSlideProposal, SlideMode},
    AnyEventTimeProposal,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum ProposalArguments {
    EventTimeBeta {
        delta: PositiveF64,
        #[serde(default = "NonNegativeF64::zero")]
        offset: NonNegativeF64,
    },
    EventTimeSlide {
        delta: PositiveF64,
        #[serde(default)]
        mode: SlideMode,
    },
}

impl From<ProposalArguments> for AnyEventTimeProposal {
    fn from(args: ProposalArguments) -> Self {
        match args {
            ProposalArguments::EventTimeBeta { delta, offset } => {
                EventTimeBetaProposal::new(delta, offset).into()
            },
            ProposalArguments::EventTimeSlide { delta, mode } => {
                EventTimeSlideProposal::new(delta, mode).into()
            },
        }
    }
}
