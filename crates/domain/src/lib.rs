//! Shared domain types for the Paceline coaching engine.
//!
//! Everything here is provider-agnostic: the error taxonomy, the LLM
//! streaming event union, conversation/tool message types, the persisted
//! data model, and the configuration surface.

pub mod config;
pub mod error;
pub mod model;
pub mod stream;
pub mod tool;

pub use error::{Error, Result};
