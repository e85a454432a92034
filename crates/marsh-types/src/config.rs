//! Fixed shell constants.
//!
//! marsh has no configuration system; these values are compile-time
//! constants by design.

/// Prompt printed when standard input is a terminal.
pub const PROMPT: &str = "$ ";

/// Longest accepted input line, in bytes, excluding the newline.
/// Longer lines are discarded through their terminating newline and
/// reported as a syntax error.
pub const MAX_LINE_LENGTH: usize = 2048;

/// Message printed for any rejected input line.
pub const SYNTAX_ERROR_MSG: &str = "Syntax error.";

/// Exit status a child reports when `exec` itself failed (program missing
/// or not executable). The parent suppresses its generic status message
/// for this value because the child already printed the exec error.
pub const EXEC_FAILURE_STATUS: i32 = 127;
