//! Command-line interface for Stoic
//!
//! This crate provides the command surface of the tool: argument parsing,
//! interactive prompts, and the dispatcher that turns each verb into
//! inventory and registry reads, one side-effecting action, and on success
//! a registry update.

pub mod cli;
pub mod dispatcher;
pub mod formatters;
pub mod prompt;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use dispatcher::{Collaborators, CommandDispatcher, CommandOutcome};
pub use prompt::{ChoicePrompt, TerminalPrompt};
