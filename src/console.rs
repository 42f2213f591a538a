//! The primary console: the one output channel that is always visible.

use parking_lot::Mutex;
use std::io::Write;

/// Writes one line to the primary console.
pub trait Console: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Console backed by the process's standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // stdout going away must not take the host application down with it
        let _ = writeln!(out, "{line}");
    }
}

/// Console that keeps every line in memory.
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Mutex<Vec<String>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Removes and returns the lines written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl Console for BufferConsole {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
