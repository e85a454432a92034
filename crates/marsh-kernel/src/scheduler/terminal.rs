//! Terminal ownership and interrupt routing.
//!
//! The shell hands the controlling terminal to each foreground group and
//! takes it back afterwards. Where the terminal supports process-group-
//! aware delivery, the OS sends SIGINT straight to the foreground group;
//! where it does not (no controlling terminal at all, e.g. piped input),
//! a manual forwarder re-sends SIGINT to whichever group is tracked as
//! foreground.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd;
use tracing::debug;

use super::groups::{self, GroupId};
use crate::error::KernelError;

/// Who should own the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foreground {
    /// The shell's own process group.
    Shell,
    /// The given pipeline group.
    Group(GroupId),
}

/// How interrupts reach the foreground group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// The terminal delivers SIGINT to its foreground process group.
    Native,
    /// No process-group-aware terminal: a SIGINT handler forwards by hand.
    Forwarding,
}

/// Process-group id of the current foreground group, or 0 when the shell
/// itself is foreground. Consulted only by the manual forwarder.
static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);

/// Job-control facade: one instance per shell, created at startup.
pub struct JobControl {
    strategy: Strategy,
}

impl JobControl {
    /// Initialize job control for this shell process.
    ///
    /// Ignores SIGTTOU (the shell reassigns terminal ownership from the
    /// background of its own session and must not be stopped for it),
    /// installs the SIGCHLD reaper, and probes the terminal once to pick
    /// the interrupt-routing strategy.
    pub fn init() -> Result<Self, KernelError> {
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        unsafe { signal::sigaction(Signal::SIGTTOU, &ignore) }
            .map_err(|e| KernelError::sys("sigaction", e))?;

        groups::init()?;

        let strategy = if unistd::tcgetpgrp(io::stdin()).is_ok() {
            Strategy::Native
        } else {
            let forward = SigAction::new(
                SigHandler::Handler(sigint_forwarder),
                SaFlags::empty(),
                SigSet::empty(),
            );
            unsafe { signal::sigaction(Signal::SIGINT, &forward) }
                .map_err(|e| KernelError::sys("sigaction", e))?;
            Strategy::Forwarding
        };
        debug!(?strategy, "job control initialized");
        Ok(Self { strategy })
    }

    /// Assign the controlling terminal.
    ///
    /// Best-effort: the terminal may not exist at all when input is not
    /// interactive, and a group may have finished (or never started)
    /// between the caller's decision and this call.
    pub fn set_foreground(&self, target: Foreground) {
        let pgid = match target {
            Foreground::Group(id) => match groups::group_pid(id) {
                Some(pid) if pid.as_raw() != 0 => pid,
                _ => return,
            },
            Foreground::Shell => match unistd::getpgid(None) {
                Ok(pgid) => pgid,
                Err(_) => return,
            },
        };

        if self.strategy == Strategy::Forwarding {
            let tracked = match target {
                Foreground::Shell => 0,
                Foreground::Group(_) => pgid.as_raw(),
            };
            FOREGROUND_PGID.store(tracked, Ordering::SeqCst);
        }

        let _ = unistd::tcsetpgrp(io::stdin(), pgid);
    }
}

/// Re-deliver an interrupt to the tracked foreground group. Runs in
/// signal context: one load, one kill.
extern "C" fn sigint_forwarder(_signo: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe { libc::kill(-pgid, libc::SIGINT) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_foreground_tolerates_missing_terminal_and_groups() {
        let jobctl = JobControl {
            strategy: Strategy::Forwarding,
        };
        // Stdin is not a terminal here; the handover is a tolerated no-op.
        jobctl.set_foreground(Foreground::Shell);
        let group = groups::new_group(None);
        // Group with no processes yet: leader pid is the zero sentinel.
        jobctl.set_foreground(Foreground::Group(group));
        groups::delete_group(group);
    }

    #[test]
    fn forwarder_ignores_shell_foreground() {
        FOREGROUND_PGID.store(0, Ordering::SeqCst);
        // Shell is foreground: the forwarder must not signal anyone.
        sigint_forwarder(libc::SIGINT);
    }

    #[test]
    fn shell_foreground_resets_tracked_pgid() {
        let jobctl = JobControl {
            strategy: Strategy::Forwarding,
        };
        FOREGROUND_PGID.store(12345, Ordering::SeqCst);
        jobctl.set_foreground(Foreground::Shell);
        assert_eq!(FOREGROUND_PGID.load(Ordering::SeqCst), 0);
    }
}
