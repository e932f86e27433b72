//! The Paceline coaching engine.
//!
//! One [`runtime::process_message`] call handles one user message: it
//! assembles the conversation context, runs the bounded LLM ⇄ tool loop,
//! streams output events to the caller, and persists the final assistant
//! reply.

pub mod bootstrap;
pub mod cli;
pub mod logbook;
pub mod runtime;
pub mod state;

pub use runtime::{process_message, CoachEvent, MessageInput};
pub use state::AppState;
