mod branch;
mod character;
mod event;

pub use branch::BranchHistory;
pub use character::{BranchBoundaryMut, CharacterHistory};
pub use event::{CharacterEvent, EventId};
