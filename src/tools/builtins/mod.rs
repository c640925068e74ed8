//! Built-in tool implementations.
//!
//! Each sub-module implements one tool the agent can invoke; `notes` is the
//! flat-file store behind `SystemTool`'s note commands.

pub mod chart;
pub mod notes;
pub mod search;
pub mod system;
pub mod weather;
