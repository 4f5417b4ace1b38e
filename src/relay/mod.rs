//! # Output relay
//!
//! Turns a guest program's raw stdout writes into whole lines on an
//! [`OutputSurface`]. Bytes are decoded as UTF-8 with a single streaming
//! decoder, accumulated in a pending buffer, and everything up to and
//! including the last `\n` is pushed to the surface. A trailing partial line
//! waits for the next write.

mod decoder;
mod surface;

pub use decoder::Utf8StreamDecoder;
pub use surface::{OutputSurface, SharedSurface, TerminalSurface};

use std::sync::{Arc, Mutex, MutexGuard};

use crate::host::{OutputHost, WriteHandler};

/// Line-buffering relay from raw output bytes to an [`OutputSurface`].
#[derive(Debug)]
pub struct OutputRelay<S> {
    surface: S,
    decoder: Utf8StreamDecoder,
    pending: String,
    bytes_received: usize,
    lines_flushed: usize,
}

impl<S: OutputSurface> OutputRelay<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            decoder: Utf8StreamDecoder::new(),
            pending: String::new(),
            bytes_received: 0,
            lines_flushed: 0,
        }
    }

    /// Handle one write from the guest.
    ///
    /// The descriptor is not inspected. Always consumes the whole input and
    /// returns its length.
    pub fn on_write(&mut self, _descriptor: u32, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        self.bytes_received += bytes.len();

        let text = self.decoder.decode(bytes);
        self.pending.push_str(&text);

        if let Some(nl) = self.pending.rfind('\n') {
            let rest = self.pending.split_off(nl + 1);
            let lines = std::mem::replace(&mut self.pending, rest);
            self.lines_flushed += lines.matches('\n').count();
            tracing::debug!(
                chars = lines.len(),
                pending = self.pending.len(),
                "flushing relayed output"
            );
            self.surface.append(&lines);
        }

        bytes.len()
    }

    /// Text received after the last flushed line terminator.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn lines_flushed(&self) -> usize {
        self.lines_flushed
    }

    /// Whether the decoder is holding the first bytes of a split character.
    pub fn has_partial_char(&self) -> bool {
        self.decoder.has_partial()
    }

    /// Give back the surface and the unflushed tail.
    pub fn into_parts(self) -> (S, String) {
        (self.surface, self.pending)
    }
}

/// Shared handle to a configured relay.
///
/// The host holds one clone as its write handler, the embedder keeps another
/// to look at the pending buffer. The mutex serializes writes.
#[derive(Debug)]
pub struct RelayHandle<S> {
    inner: Arc<Mutex<OutputRelay<S>>>,
}

impl<S> Clone for RelayHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: OutputSurface> RelayHandle<S> {
    pub fn new(surface: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputRelay::new(surface))),
        }
    }

    pub fn pending(&self) -> String {
        self.lock().pending().to_string()
    }

    pub fn stats(&self) -> RelayStats {
        let relay = self.lock();
        RelayStats {
            bytes_received: relay.bytes_received(),
            lines_flushed: relay.lines_flushed(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutputRelay<S>> {
        // `on_write` only swaps whole strings, so a poisoned relay is intact.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: OutputSurface + Send + 'static> WriteHandler for RelayHandle<S> {
    fn write(&mut self, descriptor: u32, bytes: &[u8]) -> usize {
        self.lock().on_write(descriptor, bytes)
    }
}

/// Counters reported alongside an execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RelayStats {
    pub bytes_received: usize,
    pub lines_flushed: usize,
}

/// Build a relay over `surface` and install it as `host`'s output handler.
///
/// Calling this again on the same host replaces the earlier relay; the
/// replaced relay keeps whatever it already flushed and its pending tail is
/// dropped with it.
pub fn configure<H, S>(host: &mut H, surface: S) -> RelayHandle<S>
where
    H: OutputHost + ?Sized,
    S: OutputSurface + Send + 'static,
{
    let handle = RelayHandle::new(surface);
    if host
        .set_output_handler(Box::new(handle.clone()))
        .is_some()
    {
        tracing::warn!("output relay reconfigured; previous handler replaced");
    }
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HandlerSlot;
    use proptest::prelude::*;

    fn relay() -> OutputRelay<String> {
        OutputRelay::new(String::new())
    }

    #[test]
    fn single_complete_line() {
        let mut relay = relay();
        assert_eq!(relay.on_write(1, b"hello\n"), 6);
        assert_eq!(relay.surface(), "hello\n");
        assert_eq!(relay.pending(), "");
    }

    #[test]
    fn line_completed_by_second_write() {
        let mut relay = relay();
        relay.on_write(1, b"hello");
        assert_eq!(relay.surface(), "");
        assert_eq!(relay.pending(), "hello");

        relay.on_write(1, b" world\n");
        assert_eq!(relay.surface(), "hello world\n");
        assert_eq!(relay.pending(), "");
    }

    #[test]
    fn several_lines_with_trailing_partial() {
        let mut relay = relay();
        relay.on_write(1, b"a\nb\nc");
        assert_eq!(relay.surface(), "a\nb\n");
        assert_eq!(relay.pending(), "c");
        assert_eq!(relay.lines_flushed(), 2);
    }

    #[test]
    fn split_multibyte_char_decodes_cleanly() {
        let mut relay = relay();
        let bytes = "naïve\n".as_bytes();
        // Split inside the two-byte 'ï'.
        let cut = 3;
        relay.on_write(1, &bytes[..cut]);
        assert!(relay.has_partial_char());
        relay.on_write(1, &bytes[cut..]);
        assert_eq!(relay.surface(), "naïve\n");
        assert!(!relay.surface().contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn empty_write_is_a_no_op() {
        let mut relay = relay();
        relay.on_write(1, b"tail");
        assert_eq!(relay.on_write(1, b""), 0);
        assert_eq!(relay.surface(), "");
        assert_eq!(relay.pending(), "tail");
        assert_eq!(relay.bytes_received(), 4);
    }

    #[test]
    fn descriptor_is_ignored() {
        let mut relay = relay();
        relay.on_write(1, b"out ");
        relay.on_write(2, b"err\n");
        assert_eq!(relay.surface(), "out err\n");
    }

    #[test]
    fn malformed_input_is_replaced_not_rejected() {
        let mut relay = relay();
        assert_eq!(relay.on_write(1, b"bad \xff\n"), 6);
        assert_eq!(relay.surface(), "bad \u{FFFD}\n");
    }

    #[test]
    fn into_parts_returns_unflushed_tail() {
        let mut relay = relay();
        relay.on_write(1, b"done\nprompt> ");
        let (surface, pending) = relay.into_parts();
        assert_eq!(surface, "done\n");
        assert_eq!(pending, "prompt> ");
    }

    #[test]
    fn configure_installs_handler_on_host() {
        let mut slot = HandlerSlot::new();
        let surface = SharedSurface::new();
        let handle = configure(&mut slot, surface.clone());

        assert_eq!(slot.dispatch(1, b"x\ny"), 3);
        assert_eq!(surface.contents(), "x\n");
        assert_eq!(handle.pending(), "y");
        assert_eq!(
            handle.stats(),
            RelayStats {
                bytes_received: 3,
                lines_flushed: 1
            }
        );
    }

    #[test]
    fn reconfiguring_replaces_previous_relay() {
        let mut slot = HandlerSlot::new();
        let first = SharedSurface::new();
        let second = SharedSurface::new();

        let old = configure(&mut slot, first.clone());
        slot.dispatch(1, b"one\ntw");
        let new = configure(&mut slot, second.clone());
        slot.dispatch(1, b"three\n");

        assert_eq!(first.contents(), "one\n");
        assert_eq!(old.pending(), "tw");
        assert_eq!(second.contents(), "three\n");
        assert_eq!(new.pending(), "");
    }

    proptest! {
        #[test]
        fn flushed_plus_pending_equals_decoded_input(
            text in "[a-zé€🦀\n ]{0,64}",
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let bytes = text.as_bytes();
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut relay = relay();
            for pair in points.windows(2) {
                let chunk = &bytes[pair[0]..pair[1]];
                prop_assert_eq!(relay.on_write(1, chunk), chunk.len());
            }

            prop_assert!(!relay.pending().contains('\n'));
            prop_assert_eq!(relay.surface().matches('\n').count(), text.matches('\n').count());
            let (flushed, pending) = relay.into_parts();
            prop_assert_eq!(format!("{flushed}{pending}"), text);
        }

        #[test]
        fn arbitrary_bytes_decode_like_lossy_conversion(
            bytes in proptest::collection::vec(any::<u8>(), 0..96),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
        ) {
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut relay = relay();
            for pair in points.windows(2) {
                let chunk = &bytes[pair[0]..pair[1]];
                prop_assert_eq!(relay.on_write(1, chunk), chunk.len());
            }
            // A final terminator resolves any sequence still held by the decoder.
            relay.on_write(1, b"\n");

            let mut whole = bytes.clone();
            whole.push(b'\n');
            let (flushed, pending) = relay.into_parts();
            prop_assert_eq!(pending, "");
            prop_assert_eq!(flushed, String::from_utf8_lossy(&whole));
        }
    }
}
