//! Core domain models for the pipeline
//!
//! This module defines the data structures that describe a run: the captured
//! context, the configuration, the stages and their state, and the version
//! being released.

pub mod config;
pub mod context;
pub mod pipeline;
pub mod stage;
pub mod state;
pub mod version;

pub use context::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
pub use version::*;
