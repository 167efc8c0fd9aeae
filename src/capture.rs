//! Scoped capture of graded-test output.
//!
//! Graded code writes through an [`OutputSink`] instead of the global
//! stdout handle. With no capture scope active, writes pass straight
//! through to real stdout; inside a scope they land in that scope's
//! buffer. Scopes are scoped values: ending one (explicitly or by drop)
//! always restores pass-through, so a panicking test cannot leave the
//! sink redirected.
//!
//! Each sink supports one live scope at a time. Opening a new scope
//! supersedes the old one and starts from an empty buffer, which gives
//! every test node a clean slate. Runs that must not share output each
//! construct their own sink.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SinkState {
    /// Bumped on every `capture`; a guard may only release its own epoch.
    epoch: u64,
    /// `Some` while a capture scope is active.
    buffer: Option<String>,
}

/// Cloneable write handle shared by the engine, test bodies, and the
/// listener of one run.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    state: Arc<Mutex<SinkState>>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // A poisoned sink only means a writer panicked mid-push; the
        // buffer itself is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write text through the sink.
    pub fn print(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        let mut state = self.lock();
        match state.buffer.as_mut() {
            Some(buffer) => buffer.push_str(text),
            None => {
                drop(state);
                let mut stdout = io::stdout();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
        }
    }

    /// Write text plus a trailing newline through the sink.
    pub fn println(&self, text: impl AsRef<str>) {
        self.print(format!("{}\n", text.as_ref()));
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().buffer.is_some()
    }

    /// Begin a capture scope with a fresh, empty buffer.
    ///
    /// Any scope already live on this sink is superseded: its buffered
    /// text is discarded and its guard becomes inert.
    pub fn capture(&self) -> CaptureGuard {
        let mut state = self.lock();
        state.epoch += 1;
        state.buffer = Some(String::new());
        CaptureGuard {
            sink: self.clone(),
            epoch: state.epoch,
            released: false,
        }
    }

    fn release(&self, epoch: u64) -> String {
        let mut state = self.lock();
        if state.epoch == epoch {
            state.buffer.take().unwrap_or_default()
        } else {
            String::new()
        }
    }
}

/// A live capture scope. Ends on [`finish`] or on drop; pass-through
/// resumes either way.
///
/// [`finish`]: CaptureGuard::finish
#[derive(Debug)]
pub struct CaptureGuard {
    sink: OutputSink,
    epoch: u64,
    released: bool,
}

impl CaptureGuard {
    /// End the scope and return its captured text.
    ///
    /// A guard superseded by a newer scope yields an empty string; the
    /// sink belongs to the newest scope only.
    pub fn finish(mut self) -> String {
        self.released = true;
        self.sink.release(self.epoch)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.sink.release(self.epoch);
        }
    }
}
