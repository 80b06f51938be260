//! # Host I/O Contract
//!
//! The interpreter never touches a terminal, a file, or a renderer
//! directly. Every effect that crosses the core/host boundary — grid
//! POKE/PEEK, transcript output, character input, line-buffered numeric
//! input — goes through one injected [`HostIo`] implementation, shared by
//! every worker in a [`crate::manager::WorkerManager`].
//!
//! [`GridIo`] is the default implementation: an in-process 100x100 grid, a
//! transcript buffer, and simple queues for character/line input, good
//! enough for the CLI binary and for tests. A host embedding the
//! interpreter elsewhere (a TUI debugger, a browser canvas) supplies its
//! own `HostIo` instead.

use std::collections::VecDeque;

/// Result of polling the host's line-buffered input channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineInput {
    /// `true` once a line has been finalized; `value` holds its text.
    /// `false` means a partial line may be present in `value` (never
    /// absent — an empty string, not an option, when nothing has arrived).
    pub complete: bool,
    pub value: String,
}

/// Every effect a WorkerScript program can have on the outside world.
pub trait HostIo {
    /// Read the grid cell at a linear index, wrapped mod 10,000.
    fn peek(&self, index: i32) -> i16;
    /// Write the grid cell at `(x, y)`, each wrapped mod 100; `value` is
    /// masked to its low 8 bits.
    fn poke(&mut self, x: i32, y: i32, value: i16);
    /// Emit a string to the transcript verbatim, no implicit newline.
    fn log_str(&mut self, text: &str);
    /// Emit a decimal-formatted int16 to the transcript, no implicit newline.
    fn log_number(&mut self, value: i16);
    /// Non-blocking single character read; 0 means nothing is available.
    fn get_char(&mut self) -> u8;
    /// Poll the line-buffered input channel.
    fn get_line(&mut self) -> LineInput;
    /// Emit one byte (low 8 bits) to the output channel.
    fn put(&mut self, value: i16);
}

fn wrap100(v: i32) -> i32 {
    v.rem_euclid(100)
}

/// The linear grid index `peek`/`poke` agree on for a given (x, y), each
/// wrapped mod 100 first. Exposed so the interpreter's `PeekExpression` and
/// `CompareAndSwapExpression` can read the same cell a `` `= `` POKE wrote.
pub fn grid_index(x: i32, y: i32) -> i32 {
    wrap100(y) * 100 + wrap100(x)
}

/// An in-process `HostIo`: a 100x100 grid, a transcript string, and simple
/// FIFO queues standing in for the host's character/line input channels.
#[derive(Debug, Default)]
pub struct GridIo {
    grid: Vec<u8>,
    transcript: String,
    char_input: VecDeque<u8>,
    /// Completed lines waiting to be claimed by `get_line`.
    line_queue: VecDeque<String>,
    /// Text of the line currently being typed but not yet finalized.
    pending_line: String,
}

impl GridIo {
    pub fn new() -> Self {
        Self {
            grid: vec![0; 10_000],
            transcript: String::new(),
            char_input: VecDeque::new(),
            line_queue: VecDeque::new(),
            pending_line: String::new(),
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn push_char_input(&mut self, byte: u8) {
        self.char_input.push_back(byte);
    }

    /// Queue a finished line for `get_line` to report as `complete`.
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.line_queue.push_back(line.into());
    }

    /// Grow the partial line currently being typed, visible to `get_line`
    /// as `complete: false` until `push_line` finalizes it.
    pub fn type_partial(&mut self, text: &str) {
        self.pending_line.push_str(text);
    }

    pub fn grid_cell(&self, x: i32, y: i32) -> u8 {
        let idx = (wrap100(y) * 100 + wrap100(x)) as usize;
        self.grid[idx]
    }
}

impl HostIo for GridIo {
    fn peek(&self, index: i32) -> i16 {
        let idx = index.rem_euclid(10_000) as usize;
        self.grid[idx] as i16
    }

    fn poke(&mut self, x: i32, y: i32, value: i16) {
        let idx = (wrap100(y) * 100 + wrap100(x)) as usize;
        self.grid[idx] = (value as u16 & 0xFF) as u8;
    }

    fn log_str(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    fn log_number(&mut self, value: i16) {
        self.transcript.push_str(&value.to_string());
    }

    fn get_char(&mut self) -> u8 {
        self.char_input.pop_front().unwrap_or(0)
    }

    fn get_line(&mut self) -> LineInput {
        if let Some(line) = self.line_queue.pop_front() {
            self.pending_line.clear();
            return LineInput { complete: true, value: line };
        }
        LineInput { complete: false, value: self.pending_line.clone() }
    }

    fn put(&mut self, value: i16) {
        let byte = (value as u16 & 0xFF) as u8;
        self.transcript.push(byte as char);
    }
}
