//! marsh-types: shared types for the marsh shell.
//!
//! This crate holds the plain data types that cross crate boundaries:
//!
//! - **AST**: the pipeline/command/redirect tree the parser produces and
//!   the execution engine consumes
//! - **Status**: process termination status and background-completion notes
//! - **Config**: the shell's fixed constants (prompt, line length limits)
//!
//! Nothing in here touches the operating system.

pub mod ast;
pub mod config;
pub mod status;

pub use ast::{Command, Line, Pipeline, Redirect, RedirectKind};
pub use status::{DeathNote, ProcessStatus};
