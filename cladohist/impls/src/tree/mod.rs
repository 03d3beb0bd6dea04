mod time_tree;

pub use time_tree::{TimeTree, TreeError};
