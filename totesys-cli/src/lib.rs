//! Command-line orchestrator for the Totesys warehouse pipeline: wires
//! config, storage and secrets together and runs the stages.

pub mod cli;
pub mod errors;
pub mod pipeline;

pub use pipeline::Pipeline;
