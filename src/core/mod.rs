//! Core domain models for the workflow
//!
//! This module defines the graph (pipeline, tasks, artifact bindings),
//! the typed task parameters and their configuration.

pub mod config;
pub mod context;
pub mod params;
pub mod pipeline;
pub mod state;
pub mod task;

pub use context::*;
pub use pipeline::*;
pub use state::*;
pub use task::*;
