//! Shared types for the Orbit tool-call pipeline and activity arbiter.

mod activity;
mod process;
mod tool;

pub use activity::*;
pub use process::*;
pub use tool::*;
