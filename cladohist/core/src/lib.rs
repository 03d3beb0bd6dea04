#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate contracts;

pub mod cogs;
pub mod error;
pub mod event_map;
pub mod history;
pub mod matrix;
pub mod probability;
