//! intelligent_agent: tool-using conversational agent with a web chat
//! front end.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod agent;
pub mod config;
pub mod gateway;
pub mod models;
pub mod tools;
