//! Output streams. A [`SinkStack`] is a LIFO stack of [`Sink`]s; writes
//! always go to the top, which can be temporarily blocked (writes dropped,
//! line count unaffected) by the `:block`/`:unblock` directives and the
//! matching `HostBindings` calls.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Display name used for standard output.
pub const STDOUT_NAME: &str = "<STDOUT>";

/// One output stream.
pub struct Sink {
    name: String,
    handle: Box<dyn Write>,
    line: usize,
    blocked: bool,
}

impl Sink {
    pub fn new(name: impl Into<String>, handle: Box<dyn Write>) -> Self {
        Sink { name: name.into(), handle, line: 0, blocked: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn block(&mut self) {
        self.blocked = true;
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
    }

    /// Writes one byte unless blocked; increments the line count on `\n`
    /// regardless of whether the byte was actually written to the
    /// underlying stream (matching the spec: line count does not advance
    /// while blocked, since the write itself is skipped).
    pub fn write_byte(&mut self, b: u8, flush: bool) -> io::Result<()> {
        if self.blocked {
            return Ok(());
        }
        self.handle.write_all(&[b])?;
        if b == b'\n' {
            self.line += 1;
        }
        if flush {
            self.handle.flush()?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8], flush: bool) -> io::Result<()> {
        for &b in bytes {
            self.write_byte(b, flush)?;
        }
        Ok(())
    }
}

/// Ordered sequence of [`Sink`]s; the last element is the current top.
/// Always has at least one entry — standard output at the bottom.
pub struct SinkStack {
    sinks: Vec<Sink>,
}

impl SinkStack {
    pub fn new(handle: Box<dyn Write>) -> Self {
        SinkStack { sinks: vec![Sink::new(STDOUT_NAME, handle)] }
    }

    pub fn top(&self) -> &Sink {
        self.sinks.last().expect("sink stack always has at least one entry")
    }

    pub fn top_mut(&mut self) -> &mut Sink {
        self.sinks.last_mut().expect("sink stack always has at least one entry")
    }

    /// Pushes `name` (or standard output if `None`) as the new top.
    pub fn push(&mut self, name: Option<&Path>) -> io::Result<()> {
        let (display_name, handle): (String, Box<dyn Write>) = match name {
            Some(path) => (path.display().to_string(), Box::new(File::create(path)?)),
            None => (STDOUT_NAME.to_string(), Box::new(io::stdout())),
        };
        self.sinks.push(Sink::new(display_name, handle));
        Ok(())
    }

    /// Closes and drops the top sink, unless it is the bottom (standard
    /// output) entry.
    pub fn pop(&mut self) {
        if self.sinks.len() > 1 {
            self.sinks.pop();
        }
    }
}
