//! Fixed-buffer line reader.
//!
//! Reads one logical line at a time from standard input with a single
//! fixed buffer: no line editing, no history. The prompt is printed only
//! when input is a character device. A line longer than
//! [`MAX_LINE_LENGTH`] is discarded through its terminating newline and
//! reported as a syntax error, and reading continues with the next line.
//!
//! Reads are retried on EINTR: the SIGCHLD reaper interrupts `read(2)`
//! whenever a background child dies mid-prompt.

use std::io::{self, Write};
use std::os::unix::io::RawFd;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::stat;
use nix::unistd;

use marsh_types::config::{MAX_LINE_LENGTH, PROMPT, SYNTAX_ERROR_MSG};

pub struct LineReader {
    fd: RawFd,
    buf: Vec<u8>,
    /// Bytes currently buffered.
    offset: usize,
    /// Length of the line handed out by the previous call, still sitting
    /// at the front of the buffer; consumed on the next call.
    last_line_len: Option<usize>,
    print_prompt: bool,
}

impl LineReader {
    /// Reader over the shell's standard input.
    pub fn new() -> Result<Self> {
        Self::from_fd(libc::STDIN_FILENO)
    }

    fn from_fd(fd: RawFd) -> Result<Self> {
        let st = stat::fstat(fd).context("fstat on input")?;
        let print_prompt = (st.st_mode & libc::S_IFMT) == libc::S_IFCHR;
        Ok(Self {
            fd,
            buf: vec![0; MAX_LINE_LENGTH + 1],
            offset: 0,
            last_line_len: None,
            print_prompt,
        })
    }

    /// Read the next logical line, or `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        // Consume the line handed out last time.
        if let Some(last) = self.last_line_len.take() {
            let consumed = (last + 1).min(self.offset);
            self.buf.copy_within(consumed..self.offset, 0);
            self.offset -= consumed;
        }

        let mut finished_line = true;
        let mut ignore_line = false;
        let mut saw_eof = false;

        while !saw_eof || self.offset > 0 {
            if self.print_prompt && finished_line {
                finished_line = false;
                print!("{PROMPT}");
                io::stdout().flush().context("flushing prompt")?;
            }

            let mut line_end = self.buf[..self.offset].iter().position(|&b| b == b'\n');
            if line_end.is_none() && self.offset == self.buf.len() {
                // Buffer full with no newline in sight: the line is too
                // long. Drop what we have and keep discarding until the
                // newline shows up.
                self.offset = 0;
                ignore_line = true;
            }

            if line_end.is_some() || saw_eof {
                let end = line_end.take().unwrap_or(self.offset);
                if !ignore_line {
                    self.last_line_len = Some(end);
                    let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
                    return Ok(Some(line));
                }

                eprintln!("{SYNTAX_ERROR_MSG}");
                ignore_line = false;
                finished_line = true;
                let consumed = (end + 1).min(self.offset);
                self.buf.copy_within(consumed..self.offset, 0);
                self.offset -= consumed;
            } else {
                let read_bytes = loop {
                    match unistd::read(self.fd, &mut self.buf[self.offset..]) {
                        Ok(n) => break n,
                        Err(Errno::EINTR) => continue,
                        Err(errno) => {
                            return Err(errno).context("reading input");
                        }
                    }
                };
                self.offset += read_bytes;
                saw_eof = read_bytes == 0;
            }
        }

        Ok(None)
    }
}
