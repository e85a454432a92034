//! marsh-kernel: the core of the marsh shell.
//!
//! This crate provides:
//!
//! - **Lexer**: tokenizes one input line using logos
//! - **Parser**: builds the pipeline AST from tokens and validates it
//! - **Scheduler**: the process/group registry with its SIGCHLD handler,
//!   the pipeline execution engine, and terminal ownership
//! - **Tools**: the built-in command trait, registry, and implementations
//!
//! The front end (marsh-repl) is responsible for looping over input lines,
//! invoking the parser, running each pipeline, and printing queued
//! background-completion notices before each prompt.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod scheduler;
pub mod tools;

pub use error::KernelError;
pub use parser::{check_line, parse_line};
pub use scheduler::{
    drain_death_notes, Foreground, GroupId, JobControl, PipelineRunner, SigchldGuard,
};
pub use tools::{register_builtins, Builtin, BuiltinError, BuiltinRegistry};
