//! The built-in command trait.

use thiserror::Error;

/// Why a built-in invocation failed.
///
/// Built-ins report their own specific diagnostics to stderr as they run;
/// this error only carries enough for the caller's generic report.
#[derive(Debug, Error)]
pub enum BuiltinError {
    /// Wrong number or shape of arguments.
    #[error("bad usage")]
    Usage,
    /// The action itself failed.
    #[error("{0}")]
    Failed(String),
}

/// An in-process shell action.
///
/// `argv` arrives the way the parser produced it: the built-in's own name
/// first, arguments after.
pub trait Builtin: Send + Sync {
    /// Name the registry files this built-in under.
    fn name(&self) -> &str;

    /// Run the action in the shell's own process.
    fn run(&self, argv: &[String]) -> Result<(), BuiltinError>;
}
