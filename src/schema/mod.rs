//! Schema module - configuration types for the goal-region sampler.

mod config;

pub use config::*;
