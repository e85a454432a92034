//! marsh REPL — the interactive front end of the marsh shell.
//!
//! The loop is deliberately thin: drain and print queued
//! background-completion notices, read one line, parse it, and hand each
//! pipeline to the kernel's runner. Everything interesting — process
//! groups, pipes, signals, the terminal — lives in marsh-kernel.

pub mod linereader;

use std::sync::Arc;

use anyhow::{Context, Result};

use marsh_kernel::{
    check_line, drain_death_notes, parse_line, register_builtins, BuiltinRegistry, JobControl,
    KernelError, PipelineRunner,
};
use marsh_types::config::SYNTAX_ERROR_MSG;

use crate::linereader::LineReader;

/// REPL state: the line reader and the pipeline runner.
pub struct Repl {
    reader: LineReader,
    runner: PipelineRunner,
}

impl Repl {
    /// Create a REPL: initialize job control (signal handlers, terminal
    /// strategy), register the built-ins, and open the line reader.
    pub fn new() -> Result<Self> {
        let jobctl = Arc::new(JobControl::init().context("initializing job control")?);

        let mut builtins = BuiltinRegistry::new();
        register_builtins(&mut builtins);

        let runner = PipelineRunner::new(Arc::new(builtins), jobctl);
        let reader = LineReader::new().context("opening input")?;

        Ok(Self { reader, runner })
    }

    /// Main loop: runs until end of input.
    ///
    /// Errors surfacing here are the fatal kind (registry or OS resource
    /// failures); everything line-scoped was already reported and
    /// swallowed by `process_line`.
    pub fn run(&mut self) -> Result<()> {
        loop {
            for note in drain_death_notes() {
                println!("{note}");
            }

            let Some(line) = self.reader.read_line()? else {
                break;
            };
            self.process_line(&line)?;
        }
        Ok(())
    }

    /// Parse and execute one input line.
    pub fn process_line(&mut self, line: &str) -> Result<()> {
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(KernelError::Syntax) => {
                eprintln!("{SYNTAX_ERROR_MSG}");
                return Ok(());
            }
            Err(err) => return Err(err).context("parsing input line"),
        };

        if !check_line(&parsed) {
            eprintln!("{SYNTAX_ERROR_MSG}");
            return Ok(());
        }

        for pipeline in &parsed.pipelines {
            self.runner
                .run(&pipeline.commands, pipeline.background)
                .context("running pipeline")?;
        }
        Ok(())
    }
}
