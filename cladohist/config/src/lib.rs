#![deny(clippy::pedantic)]

#[macro_use]
extern crate log;

pub mod args;
pub mod logger;
pub mod parse;

#[cfg(test)]
mod tests;

pub use args::{Chain, ChainArguments};

/// Parses and builds a chain from its RON configuration.
///
/// # Errors
///
/// Returns an error if `ron_args` is not a valid configuration, or if the
/// initial state of the chain cannot be drawn.
pub fn build_chain(ron_args: &str) -> anyhow::Result<Chain> {
    let args: ChainArguments = parse::try_parse("chain", ron_args)?;

    args.build()
}
