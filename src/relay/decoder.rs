//! Streaming UTF-8 decoding for byte chunks that may split a character.

/// Decodes UTF-8 across chunk boundaries.
///
/// A multi-byte sequence cut off at the end of one chunk is held back and
/// completed by the next call. Invalid input never fails: each maximal
/// invalid subpart becomes a single U+FFFD, matching what a browser
/// `TextDecoder` produces in streaming mode.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    partial: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return String::new();
        }

        let joined;
        let input: &[u8] = if self.partial.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.partial);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk.
                            self.partial.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Whether an incomplete sequence is waiting for its continuation bytes.
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello\n"), "hello\n");
        assert!(!decoder.has_partial());
    }

    #[test]
    fn two_byte_char_split_across_chunks() {
        let mut decoder = Utf8StreamDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert!(decoder.has_partial());
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert!(!decoder.has_partial());
    }

    #[test]
    fn four_byte_char_fed_one_byte_at_a_time() {
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        for b in "a🦀b".as_bytes() {
            text.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        assert_eq!(text, "a🦀b");
    }

    #[test]
    fn invalid_bytes_become_replacement_chars() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        // Truncated 3-byte lead followed by ASCII is one maximal subpart.
        assert_eq!(decoder.decode(b"\xe2\x82x"), "\u{FFFD}x");
        assert!(!decoder.has_partial());
    }

    #[test]
    fn partial_then_invalid_continuation() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"\xc3"), "");
        assert_eq!(decoder.decode(b"z"), "\u{FFFD}z");
    }

    #[test]
    fn empty_chunk_keeps_state() {
        let mut decoder = Utf8StreamDecoder::new();
        decoder.decode(b"\xe2\x82");
        assert_eq!(decoder.decode(b""), "");
        assert_eq!(decoder.decode(b"\xac"), "€");
    }
}
