//! Pipeline execution for marsh.
//!
//! Turns one parsed pipeline into a process group of running children
//! connected by pipes, then either waits for the group (foreground) or
//! registers completion callbacks and returns immediately (background).
//!
//! The whole construction runs inside one exclusion window, so a child
//! that dies instantly cannot be reaped before it is registered.

use std::ffi::CString;
use std::mem;
use std::os::fd::IntoRawFd;
use std::os::unix::io::RawFd;
use std::process;
use std::sync::Arc;

use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use marsh_types::ast::{Command, Redirect, RedirectKind};
use marsh_types::config::EXEC_FAILURE_STATUS;
use marsh_types::status::{DeathNote, ProcessStatus};

use super::groups::{self, GroupId};
use super::terminal::{Foreground, JobControl};
use crate::error::KernelError;
use crate::tools::BuiltinRegistry;

/// A pair of pipe descriptors, or the standard-stream sentinels when no
/// pipe is in place. Closing restores the sentinels, so a second close is
/// a no-op by construction.
#[derive(Debug, Clone, Copy)]
struct PipePair {
    read: RawFd,
    write: RawFd,
}

impl PipePair {
    const fn std() -> Self {
        Self {
            read: libc::STDIN_FILENO,
            write: libc::STDOUT_FILENO,
        }
    }

    /// A fresh pipe with both ends close-on-exec, so a later stage's child
    /// does not inherit ends meant for an earlier stage.
    fn fresh() -> Result<Self, KernelError> {
        let (read, write) =
            unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| KernelError::sys("pipe", e))?;
        Ok(Self {
            read: read.into_raw_fd(),
            write: write.into_raw_fd(),
        })
    }

    fn close(&mut self) {
        if self.read != libc::STDIN_FILENO {
            let _ = close_retry(self.read);
            self.read = libc::STDIN_FILENO;
        }
        if self.write != libc::STDOUT_FILENO {
            let _ = close_retry(self.write);
            self.write = libc::STDOUT_FILENO;
        }
    }
}

/// A stage's exec arguments, converted before forking so the child does
/// not have to allocate.
struct PreparedStage {
    prog: CString,
    argv: Vec<CString>,
}

impl PreparedStage {
    fn new(command: &Command) -> Result<Self, KernelError> {
        let argv = command
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(|_| KernelError::BadWord(arg.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let prog = argv[0].clone();
        Ok(Self { prog, argv })
    }
}

/// Runs pipelines: one process group per pipeline, one child per
/// non-trivial stage.
pub struct PipelineRunner {
    builtins: Arc<BuiltinRegistry>,
    jobctl: Arc<JobControl>,
}

impl PipelineRunner {
    pub fn new(builtins: Arc<BuiltinRegistry>, jobctl: Arc<JobControl>) -> Self {
        Self { builtins, jobctl }
    }

    /// Execute one pipeline.
    ///
    /// Foreground pipelines own the terminal until every stage has been
    /// reaped, then report non-trivial exit statuses. Background
    /// pipelines return immediately; their terminations surface later
    /// through the dead-process queue.
    ///
    /// Only OS-level resource failures are errors to the caller; a child
    /// that runs and fails is reported to the user, not returned.
    pub fn run(&self, commands: &[Command], background: bool) -> Result<(), KernelError> {
        if commands.is_empty() {
            return Ok(());
        }

        let _guard = groups::block_sigchld();
        let group = groups::new_group(None);
        let mut prev = PipePair::std();
        let mut next = PipePair::std();
        let mut spawned = 0usize;

        let result = self.spawn_stages(
            commands,
            group,
            background,
            &mut prev,
            &mut next,
            &mut spawned,
        );
        // Engine-held pipe ends are closed on success and failure alike.
        prev.close();
        next.close();

        if spawned == 0 {
            // Nothing was forked (all stages empty, or a lone built-in):
            // the group never sees the reaper, so reclaim it here.
            groups::delete_group(group);
            return result;
        }
        result?;

        if background {
            debug!(group = %group, stages = spawned, "pipeline running in background");
            return Ok(());
        }

        self.jobctl.set_foreground(Foreground::Group(group));
        groups::wait_for_group(group);
        groups::delete_group(group);
        self.jobctl.set_foreground(Foreground::Shell);

        for note in groups::drain_foreground_reports() {
            report_termination(&note);
        }
        Ok(())
    }

    fn spawn_stages(
        &self,
        commands: &[Command],
        group: GroupId,
        background: bool,
        prev: &mut PipePair,
        next: &mut PipePair,
        spawned: &mut usize,
    ) -> Result<(), KernelError> {
        for (i, command) in commands.iter().enumerate() {
            mem::swap(prev, next);
            next.close();
            if i + 1 < commands.len() {
                *next = PipePair::fresh()?;
            }

            if command.is_empty() {
                continue;
            }

            // Built-ins run in the shell's own process, but only when the
            // pipeline is a single stage. In a longer pipeline the same
            // name goes through the ordinary external lookup.
            if commands.len() == 1 {
                if let Some(builtin) = self.builtins.get(&command.argv[0]) {
                    if builtin.run(&command.argv).is_err() {
                        eprintln!("Builtin {} error.", command.argv[0]);
                    }
                    continue;
                }
            }

            self.spawn_external(command, group, background, *prev, *next)?;
            *spawned += 1;
        }
        Ok(())
    }

    fn spawn_external(
        &self,
        command: &Command,
        group: GroupId,
        background: bool,
        prev: PipePair,
        next: PipePair,
    ) -> Result<(), KernelError> {
        let prepared = PreparedStage::new(command)?;
        // Zero until the first child is registered; the first child is
        // its own group then.
        let leader = groups::group_pid(group).unwrap_or(Pid::from_raw(0));
        let callback = if background {
            note_background_exit
        } else {
            note_foreground_exit
        };

        match unsafe { unistd::fork() }.map_err(|e| KernelError::sys("fork", e))? {
            ForkResult::Parent { child } => {
                debug!(group = %group, pid = child.as_raw(), program = %command.argv[0], "forked stage");
                groups::add_process(group, child, Some(callback))
            }
            ForkResult::Child => exec_child(command, &prepared, prev, next, leader),
        }
    }
}

/// Background completions feed the dead-process queue, drained by the
/// front end before the next prompt.
fn note_background_exit(pid: Pid, status: ProcessStatus) {
    groups::enqueue_death_note(DeathNote {
        pid: pid.as_raw(),
        status,
    });
}

/// Foreground completions feed the report list, drained by the runner
/// after the wait.
fn note_foreground_exit(pid: Pid, status: ProcessStatus) {
    groups::record_foreground_report(pid, status);
}

fn report_termination(note: &DeathNote) {
    match note.status {
        // The exec-failure status is suppressed: the child already
        // printed the real error.
        ProcessStatus::Exited(code) if code != 0 && code != EXEC_FAILURE_STATUS => {
            println!("Program returned status {code}");
        }
        ProcessStatus::Signaled(sig) => {
            println!("Program killed by signal {sig}");
        }
        _ => {}
    }
}

/// Child side of a forked stage: restore default signal state, join the
/// pipeline's process group, wire standard streams, and become the
/// requested program. Never returns.
fn exec_child(
    command: &Command,
    prepared: &PreparedStage,
    prev: PipePair,
    next: PipePair,
    leader: Pid,
) -> ! {
    // Undo what the child inherited from the shell: the exclusion
    // window's blocked SIGCHLD and the shell's SIGINT/SIGTTOU handling.
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&set), None);
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &default);
        let _ = signal::sigaction(Signal::SIGTTOU, &default);
    }

    // Both sides of the fork place the child; whichever runs first wins.
    let _ = unistd::setpgid(Pid::from_raw(0), leader);

    if let Err(err) = wire_stdio(command, prev, next) {
        eprintln!("{err}");
        process::exit(EXEC_FAILURE_STATUS);
    }

    if let Err(errno) = unistd::execvp(&prepared.prog, &prepared.argv) {
        eprintln!("{}: {}", command.argv[0], errno.desc());
    }
    process::exit(EXEC_FAILURE_STATUS);
}

/// Point the child's standard input/output at the pipeline's pipes, then
/// apply the effective redirections (last one of each direction wins),
/// input before output, and finally make sure the resulting descriptors
/// survive exec.
fn wire_stdio(command: &Command, prev: PipePair, next: PipePair) -> Result<(), KernelError> {
    if prev.read != libc::STDIN_FILENO {
        dup2_retry(prev.read, libc::STDIN_FILENO)?;
    }
    if next.write != libc::STDOUT_FILENO {
        dup2_retry(next.write, libc::STDOUT_FILENO)?;
    }

    let (input, output) = effective_redirects(&command.redirects);
    if let Some(path) = input {
        redirect_fd(path, OFlag::O_RDONLY, libc::STDIN_FILENO)?;
    }
    if let Some((path, append)) = output {
        let disposition = if append { OFlag::O_APPEND } else { OFlag::O_TRUNC };
        redirect_fd(
            path,
            OFlag::O_WRONLY | OFlag::O_CREAT | disposition,
            libc::STDOUT_FILENO,
        )?;
    }

    // The standard descriptors may be dups of close-on-exec pipe ends.
    clear_cloexec(libc::STDIN_FILENO)?;
    clear_cloexec(libc::STDOUT_FILENO)?;
    Ok(())
}

/// Pick the winning redirection of each direction: the last input, and
/// the last output-or-append (`bool` is the append flag).
fn effective_redirects(redirects: &[Redirect]) -> (Option<&str>, Option<(&str, bool)>) {
    let mut input = None;
    let mut output = None;
    for redirect in redirects {
        match redirect.kind {
            RedirectKind::Input => input = Some(redirect.target.as_str()),
            RedirectKind::Output => output = Some((redirect.target.as_str(), false)),
            RedirectKind::Append => output = Some((redirect.target.as_str(), true)),
        }
    }
    (input, output)
}

/// Open a file and install it as the given standard descriptor.
fn redirect_fd(path: &str, flags: OFlag, target: RawFd) -> Result<(), KernelError> {
    let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
    let fd = loop {
        match fcntl::open(path, flags, mode) {
            Ok(fd) => break fd,
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                return Err(KernelError::Redirect {
                    path: path.to_string(),
                    errno,
                })
            }
        }
    };
    dup2_retry(fd, target)?;
    close_retry(fd).map_err(|e| KernelError::sys("close", e))?;
    Ok(())
}

fn dup2_retry(src: RawFd, dst: RawFd) -> Result<(), KernelError> {
    loop {
        match unistd::dup2(src, dst) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(KernelError::sys("dup2", errno)),
        }
    }
}

fn close_retry(fd: RawFd) -> Result<(), Errno> {
    loop {
        match unistd::close(fd) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno),
        }
    }
}

fn clear_cloexec(fd: RawFd) -> Result<(), KernelError> {
    let flags = fcntl::fcntl(fd, FcntlArg::F_GETFD).map_err(|e| KernelError::sys("fcntl", e))?;
    let mut fdflags = FdFlag::from_bits_truncate(flags);
    fdflags.remove(FdFlag::FD_CLOEXEC);
    fcntl::fcntl(fd, FcntlArg::F_SETFD(fdflags)).map_err(|e| KernelError::sys("fcntl", e))?;
    Ok(())
}
