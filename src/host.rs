//! Registration seam between a guest runtime and whatever consumes its output.

use std::sync::{Arc, Mutex};

/// Receives the raw bytes a guest writes to one of its output descriptors.
pub trait WriteHandler: Send {
    /// Consume `bytes` and return how many were taken.
    fn write(&mut self, descriptor: u32, bytes: &[u8]) -> usize;
}

impl<F> WriteHandler for F
where
    F: FnMut(u32, &[u8]) -> usize + Send,
{
    fn write(&mut self, descriptor: u32, bytes: &[u8]) -> usize {
        self(descriptor, bytes)
    }
}

/// A runtime that lets one output handler be registered for its guests.
pub trait OutputHost {
    /// Install `handler`, returning the one it replaces.
    fn set_output_handler(
        &mut self,
        handler: Box<dyn WriteHandler>,
    ) -> Option<Box<dyn WriteHandler>>;
}

/// What a guest run produced, apart from its relayed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Short description of the run's result (entry point status or the
    /// script's completion value).
    pub output: String,
    pub elapsed_ms: u64,
}

/// The installed handler, shared between a host and its guest callbacks.
#[derive(Clone, Default)]
pub struct HandlerSlot {
    inner: Arc<Mutex<Option<Box<dyn WriteHandler>>>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().map(|h| h.is_some()).unwrap_or(false)
    }

    /// Forward a guest write to the installed handler.
    ///
    /// With nothing installed the write is dropped but still reported as
    /// consumed, so the guest does not retry.
    pub fn dispatch(&self, descriptor: u32, bytes: &[u8]) -> usize {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(handler) => handler.write(descriptor, bytes),
            None => {
                tracing::debug!(
                    descriptor,
                    len = bytes.len(),
                    "no output handler installed; dropping write"
                );
                bytes.len()
            }
        }
    }
}

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSlot")
            .field("installed", &self.is_set())
            .finish()
    }
}

impl OutputHost for HandlerSlot {
    fn set_output_handler(
        &mut self,
        handler: Box<dyn WriteHandler>,
    ) -> Option<Box<dyn WriteHandler>> {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(handler)
    }
}
