//! Output surfaces: where relayed lines end up.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

/// A text container owned by the embedder that the relay appends to.
pub trait OutputSurface {
    /// Append already-decoded text. Called only with complete lines.
    fn append(&mut self, text: &str);
}

impl OutputSurface for String {
    fn append(&mut self, text: &str) {
        self.push_str(text);
    }
}

impl<S: OutputSurface + ?Sized> OutputSurface for &mut S {
    fn append(&mut self, text: &str) {
        (**self).append(text);
    }
}

/// A cloneable in-memory surface.
///
/// One clone goes to the relay, the embedder keeps another to read what has
/// been displayed so far.
#[derive(Debug, Clone, Default)]
pub struct SharedSurface {
    inner: Arc<Mutex<String>>,
}

impl SharedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn contents(&self) -> String {
        self.lock().clone()
    }

    /// Drain the surface, leaving it empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        // Appends are a single `push_str`, so a poisoned buffer is intact.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputSurface for SharedSurface {
    fn append(&mut self, text: &str) {
        self.lock().push_str(text);
    }
}

/// Writes every flushed chunk straight to the host's stdout.
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl OutputSurface for TerminalSurface {
    fn append(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::warn!(error = %e, "failed to write relayed output to terminal");
        }
    }
}
