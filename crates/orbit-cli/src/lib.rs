//! Orbit command-line library: configuration, logging, built-in tools and
//! the child-process bridge behind the `orbit` binary.
//!
//! Kept separate from main.rs so the pieces can be tested.

pub mod config;
pub mod logging;
pub mod process;
pub mod tools;
