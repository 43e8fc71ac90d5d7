//! Core domain models for ci-pipeline
//!
//! This module defines the fundamental data structures that represent
//! pipelines, matrix entries, phases, commands and their configuration.

pub mod config;
pub mod pipeline;
pub mod phase;
pub mod condition;
pub mod context;
pub mod state;

pub use pipeline::*;
pub use phase::*;
pub use context::*;
pub use state::*;
