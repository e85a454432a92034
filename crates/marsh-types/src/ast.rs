//! Pipeline AST: the tree the parser hands to the execution engine.
//!
//! A `Line` is a sequence of pipelines separated by `;` or `&` (where `&`
//! marks the pipeline it terminates as background). A `Pipeline` is a
//! sequence of commands connected by `|`. A `Command` is an argument
//! vector plus the redirections written on it, in source order.

use std::fmt;

/// Direction of a redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `< path` — standard input from a file.
    Input,
    /// `> path` — standard output to a file, truncating.
    Output,
    /// `>> path` — standard output to a file, appending.
    Append,
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectKind::Input => write!(f, "<"),
            RedirectKind::Output => write!(f, ">"),
            RedirectKind::Append => write!(f, ">>"),
        }
    }
}

/// One redirection on a command.
///
/// A command may carry several redirections of the same direction; the
/// last one in source order wins and the earlier ones are silently
/// superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: String,
}

impl Redirect {
    pub fn new(kind: RedirectKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

/// One stage of a pipeline: an argument vector (first element is the
/// program name) and its redirections in source order.
///
/// An empty `argv` denotes a syntactically-empty stage, which exists only
/// to represent a leading or trailing pipe placeholder. Empty stages are
/// legal in a single-stage pipeline (and are skipped) but make a
/// multi-stage pipeline malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    pub redirects: Vec<Redirect>,
}

impl Command {
    /// Whether this is a syntactically-empty stage.
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// The program name, if the stage is not empty.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Commands connected by pipes, plus the background flag from `&`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub background: bool,
}

/// One parsed input line: pipelines in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub pipelines: Vec<Pipeline>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stage_detection() {
        let empty = Command::default();
        assert!(empty.is_empty());
        assert_eq!(empty.name(), None);

        let cmd = Command {
            argv: vec!["ls".to_string(), "-l".to_string()],
            redirects: vec![],
        };
        assert!(!cmd.is_empty());
        assert_eq!(cmd.name(), Some("ls"));
    }

    #[test]
    fn redirect_kind_display() {
        assert_eq!(RedirectKind::Input.to_string(), "<");
        assert_eq!(RedirectKind::Output.to_string(), ">");
        assert_eq!(RedirectKind::Append.to_string(), ">>");
    }
}
