//! Error types for the marsh kernel.
//!
//! The taxonomy follows how far an error is allowed to propagate:
//!
//! - `Syntax` is contained to the current line; the front end reports it
//!   and keeps reading.
//! - `UnknownGroup` is a caller bug surfaced as an error rather than a
//!   silent no-op.
//! - `Sys` wraps an OS primitive failure during process, pipe, or
//!   descriptor setup. These abort the current pipeline and are treated
//!   as fatal by the front end.
//!
//! Exec failures inside a child and built-in failures never become
//! `KernelError`: the child reports and exits with a distinguished
//! status, and built-ins report to stderr without aborting anything.

use thiserror::Error;

use crate::scheduler::GroupId;

#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed input line, rejected before anything was executed.
    #[error("syntax error")]
    Syntax,

    /// A registry operation named a group that does not exist.
    #[error("unknown process group {0}")]
    UnknownGroup(GroupId),

    /// An OS primitive failed during pipeline construction.
    #[error("{op}: {errno}")]
    Sys {
        op: &'static str,
        #[source]
        errno: nix::Error,
    },

    /// A redirection target could not be opened. Reported from the child
    /// with the path, the way the user wrote it.
    #[error("{path}: {}", .errno.desc())]
    Redirect {
        path: String,
        #[source]
        errno: nix::Error,
    },

    /// A command word cannot be passed to the OS (embedded NUL byte).
    #[error("invalid argument: {0:?}")]
    BadWord(String),
}

impl KernelError {
    /// Attach the failing operation's name to a nix error.
    pub fn sys(op: &'static str, errno: nix::Error) -> Self {
        KernelError::Sys { op, errno }
    }
}
