//! Scheduler module for marsh — process groups, pipelines, and the terminal.
//!
//! This module provides:
//! - **Registry**: the process/group tables, their SIGCHLD handler, and the
//!   exclusion guard that makes main-flow access to them safe.
//! - **Pipeline execution**: fork one child per stage, wire the pipes,
//!   apply redirections, wait (foreground) or register completion
//!   callbacks (background).
//! - **Terminal ownership**: foreground handover via `tcsetpgrp`, with a
//!   manual SIGINT-forwarding fallback where the terminal offers no
//!   process-group-aware delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      PipelineRunner                        │
//! │  ┌─────────┐   pipe    ┌─────────┐   pipe    ┌─────────┐   │
//! │  │ stage 0 │──────────▶│ stage 1 │──────────▶│ stage 2 │   │
//! │  │ (fork)  │           │ (fork)  │           │ (fork)  │   │
//! │  └─────────┘           └─────────┘           └─────────┘   │
//! │       └──────── one process group per pipeline ──────┘     │
//! └────────────────────────────────────────────────────────────┘
//!
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Registry                            │
//! │  groups: Vec<Group>     processes: Vec<Process>            │
//! │  - new_group() → GroupId      - SIGCHLD handler reaps      │
//! │  - add_process(id, pid)       - wait_for_group(id)         │
//! │  - kill_group(id, sig)        - dead-process queue         │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod groups;
mod pipeline;
mod terminal;

pub use groups::{
    add_process, block_sigchld, delete_group, drain_death_notes, group_counts, group_pid, init,
    is_running, kill_group, new_group, process_status_of, wait_for_group, wait_for_sigchld,
    GroupCallback, GroupId, ProcessCallback, SigchldGuard,
};
pub use pipeline::PipelineRunner;
pub use terminal::{Foreground, JobControl};
