#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate contracts;

#[macro_use]
extern crate log;

pub mod clado_ctmc;
pub mod cogs;
pub mod composer;
pub mod data;
pub mod likelihood;
pub mod process;
pub mod proposal;
pub mod tree;
