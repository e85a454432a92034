//! Process termination status and background-completion notes.

use std::fmt;

/// How a reaped process ended.
///
/// The shell only ever observes terminations (child stops are filtered
/// out at the signal-handler level), so two variants suffice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process called `exit` with this status.
    Exited(i32),
    /// Process was terminated by this signal number.
    Signaled(i32),
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Exited(code) => write!(f, "exited with status {code}"),
            ProcessStatus::Signaled(sig) => write!(f, "killed by signal {sig}"),
        }
    }
}

/// A background-completion record: one terminated background process.
///
/// Appended from signal context when a background child is reaped, drained
/// and printed by the front end before the next prompt. `Copy` so that the
/// queue it lives in never allocates or frees in signal context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathNote {
    pub pid: i32,
    pub status: ProcessStatus,
}

impl fmt::Display for DeathNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Background process {} terminated. ({})",
            self.pid, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_formatting() {
        let note = DeathNote {
            pid: 4242,
            status: ProcessStatus::Exited(0),
        };
        assert_eq!(
            note.to_string(),
            "Background process 4242 terminated. (exited with status 0)"
        );

        let note = DeathNote {
            pid: 17,
            status: ProcessStatus::Signaled(9),
        };
        assert_eq!(
            note.to_string(),
            "Background process 17 terminated. (killed by signal 9)"
        );
    }
}
