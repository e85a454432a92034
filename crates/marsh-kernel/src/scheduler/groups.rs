//! The process/group registry.
//!
//! Owns two tables (processes, groups) and the dead-process queue, all of
//! which are mutated by the SIGCHLD handler at any moment the signal is
//! deliverable. The main flow must therefore only touch them while a
//! [`SigchldGuard`] is alive: the guard blocks SIGCHLD delivery, and
//! nesting is reference-counted so higher-level operations can call into
//! lower-level ones that also acquire it.
//!
//! The handler is the exclusion boundary itself: it never acquires the
//! guard, does no blocking calls, and its callback work is append-only
//! into fixed-capacity queues.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::debug;

use marsh_types::status::{DeathNote, ProcessStatus};

use crate::error::KernelError;

/// Shell-assigned identifier of a process group. Monotonically increasing,
/// never reused while the shell lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-process completion capability, invoked exactly once from signal
/// context when the process is reaped. Must stay append-only cheap: plain
/// `fn` so that firing and later table removal never touch the allocator.
pub type ProcessCallback = fn(Pid, ProcessStatus);

/// Per-group completion capability, invoked once when the group's alive
/// count reaches zero.
pub type GroupCallback = fn(GroupId);

/// One OS process known to the shell.
struct Process {
    pid: Pid,
    group: GroupId,
    alive: bool,
    /// Termination status, valid only once `alive` is false.
    status: Option<ProcessStatus>,
    callback: Option<ProcessCallback>,
}

/// A job-control unit: the processes started by one pipeline.
struct Group {
    id: GroupId,
    /// Pid of the first process added; doubles as the OS process-group id.
    /// Zero until the first process arrives.
    leader: Pid,
    added: u32,
    alive: u32,
    callback: Option<GroupCallback>,
}

const NOTE_QUEUE_CAPACITY: usize = 64;

/// Fixed-capacity queue of termination records. Push happens in signal
/// context and must not allocate; overflow drops the newest record.
struct NoteQueue {
    buf: [Option<DeathNote>; NOTE_QUEUE_CAPACITY],
    len: usize,
}

impl NoteQueue {
    const fn new() -> Self {
        Self {
            buf: [None; NOTE_QUEUE_CAPACITY],
            len: 0,
        }
    }

    fn push(&mut self, note: DeathNote) {
        if self.len < NOTE_QUEUE_CAPACITY {
            self.buf[self.len] = Some(note);
            self.len += 1;
        }
    }

    fn drain(&mut self) -> Vec<DeathNote> {
        let notes = self.buf[..self.len].iter().flatten().copied().collect();
        self.len = 0;
        notes
    }
}

struct Tables {
    groups: Vec<Group>,
    processes: Vec<Process>,
    next_id: u32,
    /// Background-completion records, drained by the front end.
    notes: NoteQueue,
    /// Foreground termination records, drained by the pipeline runner
    /// after waiting (the tables themselves may already be gone by then).
    reports: NoteQueue,
}

impl Tables {
    const fn new() -> Self {
        Self {
            groups: Vec::new(),
            processes: Vec::new(),
            next_id: 1,
            notes: NoteQueue::new(),
            reports: NoteQueue::new(),
        }
    }
}

struct TablesCell(UnsafeCell<Tables>);

// Accessed from exactly one thread plus its own signal handler, with the
// SigchldGuard arbitrating between the two; see `tables_mut`.
unsafe impl Sync for TablesCell {}

static TABLES: TablesCell = TablesCell(UnsafeCell::new(Tables::new()));

struct MaskCell(UnsafeCell<Option<SigSet>>);
unsafe impl Sync for MaskCell {}

/// Signal mask in effect before the outermost block, restored by
/// `wait_for_sigchld` while suspended.
static SAVED_MASK: MaskCell = MaskCell(UnsafeCell::new(None));

struct DepthCell(UnsafeCell<usize>);
unsafe impl Sync for DepthCell {}

/// Nesting depth of the exclusion window. Only the main flow touches it.
static BLOCK_DEPTH: DepthCell = DepthCell(UnsafeCell::new(0));

/// Raised by the handler so `wait_for_sigchld` can tell a child
/// termination apart from any other signal that ends the suspension.
static GOT_SIGCHLD: AtomicBool = AtomicBool::new(false);

/// Grant mutable access to the tables.
///
/// # Safety
///
/// The caller must either hold a [`SigchldGuard`] or be the SIGCHLD
/// handler itself, and must drop the returned borrow before control can
/// reach another call site. The guard suppresses handler delivery, which
/// is what makes the aliasing sound.
unsafe fn tables_mut() -> &'static mut Tables {
    &mut *TABLES.0.get()
}

/// Exclusion window over the registry tables.
///
/// While any guard is alive, SIGCHLD cannot be delivered and the main
/// flow may read and write the tables. Guards nest; delivery reopens when
/// the outermost guard drops, and only if the embedding environment had
/// not already blocked the signal before entry.
pub struct SigchldGuard {
    // Masks are per-thread state; the guard must not migrate.
    _not_send: PhantomData<*const ()>,
}

/// Open an exclusion window. See [`SigchldGuard`].
pub fn block_sigchld() -> SigchldGuard {
    let depth = unsafe { &mut *BLOCK_DEPTH.0.get() };
    if *depth == 0 {
        let mut set = SigSet::empty();
        set.add(Signal::SIGCHLD);
        let mut old = SigSet::empty();
        let _ = signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut old));
        unsafe { *SAVED_MASK.0.get() = Some(old) };
    }
    *depth += 1;
    SigchldGuard {
        _not_send: PhantomData,
    }
}

impl Drop for SigchldGuard {
    fn drop(&mut self) {
        let depth = unsafe { &mut *BLOCK_DEPTH.0.get() };
        if *depth == 0 {
            return;
        }
        *depth -= 1;
        if *depth == 0 {
            let saved = unsafe { (*SAVED_MASK.0.get()).take() };
            let already_blocked = saved.is_some_and(|m| m.contains(Signal::SIGCHLD));
            if !already_blocked {
                let mut set = SigSet::empty();
                set.add(Signal::SIGCHLD);
                let _ = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&set), None);
            }
        }
    }
}

/// Install the SIGCHLD handler.
///
/// SA_NOCLDSTOP keeps child stops out of the handler; SIGINT is masked
/// during handling because the manual interrupt forwarder reads state the
/// handler may be mid-way through changing.
pub fn init() -> Result<(), KernelError> {
    let _guard = block_sigchld();

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    let action = SigAction::new(
        SigHandler::SigAction(sigchld_handler),
        SaFlags::SA_NOCLDSTOP | SaFlags::SA_SIGINFO,
        mask,
    );
    unsafe { signal::sigaction(Signal::SIGCHLD, &action) }
        .map_err(|e| KernelError::sys("sigaction", e))?;
    Ok(())
}

/// Allocate a new, empty group and return its id.
pub fn new_group(callback: Option<GroupCallback>) -> GroupId {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };

    let id = GroupId(tables.next_id);
    tables.next_id += 1;
    tables.groups.push(Group {
        id,
        leader: Pid::from_raw(0),
        added: 0,
        alive: 0,
        callback,
    });
    debug!(group = %id, "created process group");
    id
}

/// Remove a group and all its processes from the tables. Unknown ids are
/// a no-op. Removal order is not meaningful, so swap-remove is fine.
pub fn delete_group(id: GroupId) {
    let _guard = block_sigchld();
    delete_group_in(unsafe { tables_mut() }, id);
    debug!(group = %id, "deleted process group");
}

fn delete_group_in(tables: &mut Tables, id: GroupId) {
    let mut i = 0;
    while i < tables.processes.len() {
        if tables.processes[i].group == id {
            tables.processes.swap_remove(i);
        } else {
            i += 1;
        }
    }
    if let Some(pos) = tables.groups.iter().position(|g| g.id == id) {
        tables.groups.swap_remove(pos);
    }
}

/// Register a live process under an existing group.
///
/// The first process added becomes the group leader and its pid becomes
/// the OS process-group id. The `setpgid` placement is allowed to fail:
/// the child may have exited already, or may have promoted itself first.
pub fn add_process(
    group_id: GroupId,
    pid: Pid,
    callback: Option<ProcessCallback>,
) -> Result<(), KernelError> {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };

    let Some(pos) = tables.groups.iter().position(|g| g.id == group_id) else {
        return Err(KernelError::UnknownGroup(group_id));
    };
    let leader = {
        let group = &mut tables.groups[pos];
        if group.leader.as_raw() == 0 {
            group.leader = pid;
        }
        group.added += 1;
        group.alive += 1;
        group.leader
    };
    let _ = unistd::setpgid(pid, leader);

    tables.processes.push(Process {
        pid,
        group: group_id,
        alive: true,
        status: None,
        callback,
    });
    debug!(group = %group_id, pid = pid.as_raw(), "registered process");
    Ok(())
}

/// The group's leader pid: `None` for an unknown group, pid 0 for a group
/// that exists but has no processes yet.
pub fn group_pid(id: GroupId) -> Option<Pid> {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };
    tables.groups.iter().find(|g| g.id == id).map(|g| g.leader)
}

/// Whether the group exists and still has at least one alive process.
pub fn is_running(id: GroupId) -> bool {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };
    tables
        .groups
        .iter()
        .any(|g| g.id == id && g.alive > 0)
}

/// Best-effort signal delivery to every currently-alive process of the
/// group. Per-process failures are ignored: a process may exit between
/// the liveness check and the delivery.
pub fn kill_group(id: GroupId, sig: Signal) {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };
    for process in tables.processes.iter().filter(|p| p.group == id && p.alive) {
        let _ = signal::kill(process.pid, sig);
    }
}

/// Suspend until the next child termination is observed.
///
/// Suspension atomically installs the mask saved by the outermost guard
/// (SIGCHLD deliverable again) and waits; this closes the race where the
/// signal arrives between the liveness check and the wait. Any other
/// signal also ends the suspension, hence the flag re-check.
pub fn wait_for_sigchld() {
    let _guard = block_sigchld();
    GOT_SIGCHLD.store(false, Ordering::SeqCst);
    while !GOT_SIGCHLD.load(Ordering::SeqCst) {
        let mask = unsafe { (*SAVED_MASK.0.get()).unwrap_or_else(SigSet::empty) };
        let _ = mask.suspend();
    }
}

/// Block until the group has no alive processes. Returns immediately if
/// it already has none (or no longer exists).
pub fn wait_for_group(id: GroupId) {
    let _guard = block_sigchld();
    while is_running(id) {
        wait_for_sigchld();
    }
}

/// (processes ever added, processes still alive) for a group, or `None`
/// for an unknown group.
pub fn group_counts(id: GroupId) -> Option<(u32, u32)> {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };
    tables
        .groups
        .iter()
        .find(|g| g.id == id)
        .map(|g| (g.added, g.alive))
}

/// Captured termination status of a tracked process, available from the
/// moment it is reaped until its group is deleted.
pub fn process_status_of(pid: Pid) -> Option<ProcessStatus> {
    let _guard = block_sigchld();
    let tables = unsafe { tables_mut() };
    tables
        .processes
        .iter()
        .find(|p| p.pid == pid && !p.alive)
        .and_then(|p| p.status)
}

/// Drain the background dead-process queue.
pub fn drain_death_notes() -> Vec<DeathNote> {
    let _guard = block_sigchld();
    unsafe { tables_mut() }.notes.drain()
}

/// Append a background-completion record. Called from signal context via
/// a process callback; must stay allocation-free.
pub(crate) fn enqueue_death_note(note: DeathNote) {
    unsafe { tables_mut() }.notes.push(note);
}

/// Append a foreground termination record. Same constraints as
/// [`enqueue_death_note`].
pub(crate) fn record_foreground_report(pid: Pid, status: ProcessStatus) {
    unsafe { tables_mut() }.reports.push(DeathNote {
        pid: pid.as_raw(),
        status,
    });
}

/// Drain the foreground termination records accumulated while waiting.
pub(crate) fn drain_foreground_reports() -> Vec<DeathNote> {
    let _guard = block_sigchld();
    unsafe { tables_mut() }.reports.drain()
}

fn process_status(status: WaitStatus) -> Option<(Pid, ProcessStatus)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid, ProcessStatus::Exited(code))),
        WaitStatus::Signaled(pid, sig, _) => Some((pid, ProcessStatus::Signaled(sig as i32))),
        _ => None,
    }
}

/// The asynchronous reaper. Drains every pending termination in one
/// invocation: several children may have died before the handler ran
/// once, and the signal does not queue.
extern "C" fn sigchld_handler(
    _signo: libc::c_int,
    _info: *mut libc::siginfo_t,
    _ctx: *mut libc::c_void,
) {
    GOT_SIGCHLD.store(true, Ordering::SeqCst);
    let tables = unsafe { tables_mut() };
    loop {
        match waitpid(Some(Pid::from_raw(-1)), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                if let Some((pid, status)) = process_status(status) {
                    reap(tables, pid, status);
                }
            }
            Err(Errno::EINTR) => continue,
            // ECHILD: nothing left to reap.
            Err(_) => break,
        }
    }
}

/// Record one termination: mark the process dead, fire its callback,
/// update its group, and reclaim the group once nothing in it is alive.
fn reap(tables: &mut Tables, pid: Pid, status: ProcessStatus) {
    let Some(process) = tables
        .processes
        .iter_mut()
        .find(|p| p.alive && p.pid == pid)
    else {
        // Every tracked process can only be reaped here, so an unknown
        // pid means the tables are corrupt.
        let msg = b"marsh: reaped a process the registry does not know\n";
        unsafe { libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len()) };
        std::process::abort();
    };
    process.alive = false;
    process.status = Some(status);
    let group_id = process.group;
    if let Some(callback) = process.callback {
        callback(pid, status);
    }

    let Some(group) = tables.groups.iter_mut().find(|g| g.id == group_id) else {
        let msg = b"marsh: reaped a process with no owning group\n";
        unsafe { libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len()) };
        std::process::abort();
    };
    group.alive -= 1;
    if group.alive == 0 {
        let callback = group.callback;
        if let Some(callback) = callback {
            callback(group_id);
        }
        delete_group_in(tables, group_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Mutex, MutexGuard};

    /// The registry is process-global state and the test harness is
    /// multi-threaded; every test that touches the tables serializes here.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn lock() -> MutexGuard<'static, ()> {
        TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a synthetic termination, the way the handler would.
    fn synthetic_reap(pid: Pid, status: ProcessStatus) {
        let _guard = block_sigchld();
        reap(unsafe { tables_mut() }, pid, status);
    }

    fn fake_pid(n: i32) -> Pid {
        // High enough that `setpgid` fails (tolerated) instead of
        // touching a real process.
        Pid::from_raw(800_000 + n)
    }

    #[test]
    fn group_starts_empty_with_zero_leader() {
        let _l = lock();
        let group = new_group(None);
        assert_eq!(group_pid(group), Some(Pid::from_raw(0)));
        assert!(!is_running(group));
        delete_group(group);
        assert_eq!(group_pid(group), None);
    }

    #[test]
    fn first_process_becomes_leader() {
        let _l = lock();
        let group = new_group(None);
        add_process(group, fake_pid(1), None).unwrap();
        add_process(group, fake_pid(2), None).unwrap();
        assert_eq!(group_pid(group), Some(fake_pid(1)));
        assert!(is_running(group));
        delete_group(group);
    }

    #[test]
    fn add_process_to_unknown_group_is_an_error() {
        let _l = lock();
        let group = new_group(None);
        delete_group(group);
        assert!(matches!(
            add_process(group, fake_pid(3), None),
            Err(KernelError::UnknownGroup(_))
        ));
    }

    #[test]
    fn alive_count_tracks_unreaped_processes() {
        let _l = lock();
        let group = new_group(None);
        for n in 10..13 {
            add_process(group, fake_pid(n), None).unwrap();
        }
        assert_eq!(group_counts(group), Some((3, 3)));
        synthetic_reap(fake_pid(11), ProcessStatus::Exited(0));
        assert_eq!(group_counts(group), Some((3, 2)));
        assert!(is_running(group));
        synthetic_reap(fake_pid(10), ProcessStatus::Signaled(9));
        assert_eq!(group_counts(group), Some((3, 1)));
        // Statuses are captured per process as each one is reaped.
        assert_eq!(
            process_status_of(fake_pid(10)),
            Some(ProcessStatus::Signaled(9))
        );
        assert_eq!(
            process_status_of(fake_pid(11)),
            Some(ProcessStatus::Exited(0))
        );
        assert_eq!(process_status_of(fake_pid(12)), None);
        // Last reap reclaims the group entirely.
        synthetic_reap(fake_pid(12), ProcessStatus::Exited(1));
        assert!(!is_running(group));
        assert_eq!(group_counts(group), None);
        assert_eq!(group_pid(group), None);
    }

    static GROUP_CALLBACK_FIRED: AtomicUsize = AtomicUsize::new(0);

    fn count_group_completion(_id: GroupId) {
        GROUP_CALLBACK_FIRED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn group_callback_fires_once_after_every_process_is_reaped() {
        let _l = lock();
        GROUP_CALLBACK_FIRED.store(0, Ordering::SeqCst);
        let group = new_group(Some(count_group_completion));
        for n in 20..23 {
            add_process(group, fake_pid(n), None).unwrap();
        }
        // Out-of-order completions.
        synthetic_reap(fake_pid(22), ProcessStatus::Exited(0));
        synthetic_reap(fake_pid(20), ProcessStatus::Exited(0));
        assert_eq!(GROUP_CALLBACK_FIRED.load(Ordering::SeqCst), 0);
        synthetic_reap(fake_pid(21), ProcessStatus::Exited(0));
        assert_eq!(GROUP_CALLBACK_FIRED.load(Ordering::SeqCst), 1);
        // Reclaimed after the callback fired.
        assert_eq!(group_pid(group), None);
    }

    fn queue_note(pid: Pid, status: ProcessStatus) {
        enqueue_death_note(DeathNote {
            pid: pid.as_raw(),
            status,
        });
    }

    #[test]
    fn process_callbacks_feed_the_dead_process_queue() {
        let _l = lock();
        drain_death_notes();
        let group = new_group(None);
        add_process(group, fake_pid(30), Some(queue_note)).unwrap();
        add_process(group, fake_pid(31), Some(queue_note)).unwrap();
        synthetic_reap(fake_pid(31), ProcessStatus::Exited(3));
        synthetic_reap(fake_pid(30), ProcessStatus::Signaled(15));

        let notes = drain_death_notes();
        assert_eq!(
            notes,
            vec![
                DeathNote {
                    pid: fake_pid(31).as_raw(),
                    status: ProcessStatus::Exited(3)
                },
                DeathNote {
                    pid: fake_pid(30).as_raw(),
                    status: ProcessStatus::Signaled(15)
                },
            ]
        );
        assert!(drain_death_notes().is_empty());
    }

    #[test]
    fn wait_returns_immediately_when_nothing_runs() {
        let _l = lock();
        // Unknown group.
        wait_for_group(GroupId(0));
        // Known group whose processes all terminated before the wait.
        let group = new_group(None);
        add_process(group, fake_pid(40), None).unwrap();
        synthetic_reap(fake_pid(40), ProcessStatus::Exited(0));
        wait_for_group(group);
    }

    #[test]
    fn guard_nesting_blocks_until_outermost_drop() {
        let _l = lock();
        let outer = block_sigchld();
        let inner = block_sigchld();
        let mask = SigSet::thread_get_mask().unwrap();
        assert!(mask.contains(Signal::SIGCHLD));

        drop(inner);
        let mask = SigSet::thread_get_mask().unwrap();
        assert!(mask.contains(Signal::SIGCHLD));

        drop(outer);
        let mask = SigSet::thread_get_mask().unwrap();
        assert!(!mask.contains(Signal::SIGCHLD));
    }

    #[test]
    fn deleting_one_group_leaves_others_alone() {
        let _l = lock();
        let a = new_group(None);
        let b = new_group(None);
        add_process(a, fake_pid(50), None).unwrap();
        add_process(b, fake_pid(51), None).unwrap();
        delete_group(a);
        assert_eq!(group_pid(a), None);
        assert!(is_running(b));
        delete_group(b);
    }
}
