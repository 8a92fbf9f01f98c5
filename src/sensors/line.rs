//! Newline-delimited record assembly.
//!
//! Bytes are collected into a fixed-size buffer until a `\n` arrives; the
//! buffered text is then parsed as a float and emitted as a [`Reading`].
//! Oversized records are truncated rather than grown: once the buffer holds
//! `LINE_CAPACITY - 1` bytes, further bytes are dropped until the delimiter.

use heapless::Vec;
use log::debug;

use crate::clock::Clock;
use crate::storage::Reading;

/// Size of the record buffer. One byte is reserved, so at most
/// `LINE_CAPACITY - 1` bytes of a record are kept.
pub const LINE_CAPACITY: usize = 64;

const DELIMITER: u8 = b'\n';

/// Single-pass state machine turning a byte stream into readings.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, LINE_CAPACITY>,
    /// Bytes discarded from the current record because the buffer was full
    dropped: usize,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            dropped: 0,
        }
    }

    /// Bytes of the record collected so far
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed one byte. A reading is returned exactly when `byte` is the
    /// delimiter; its timestamp is taken from `clock` at that moment.
    pub fn feed<C: Clock>(&mut self, byte: u8, clock: &C) -> Option<Reading> {
        if byte != DELIMITER {
            if self.buffer.len() >= LINE_CAPACITY - 1 || self.buffer.push(byte).is_err() {
                self.dropped += 1;
            }
            return None;
        }

        if self.dropped > 0 {
            debug!(
                "Record exceeded {} bytes, dropped {} bytes",
                LINE_CAPACITY - 1,
                self.dropped
            );
        }

        let value = parse_float_prefix(&self.buffer);
        self.buffer.clear();
        self.dropped = 0;

        Some(Reading::new(clock.now(), value))
    }
}

/// Parse the longest float literal at the start of `bytes`, after leading
/// whitespace. Anything unparseable yields `0.0`, never an error.
///
/// Accepts `[+-]digits[.digits][(e|E)[+-]digits]` as well as `inf`,
/// `infinity` and `nan` in any case. Trailing garbage such as a `\r` or a
/// unit suffix is ignored.
pub fn parse_float_prefix(bytes: &[u8]) -> f32 {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let rest = &bytes[start..];
    let end = float_prefix_len(rest);

    core::str::from_utf8(&rest[..end])
        .ok()
        .and_then(|text| text.parse::<f32>().ok())
        .unwrap_or(0.0)
}

fn float_prefix_len(bytes: &[u8]) -> usize {
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    for word in ["infinity", "inf", "nan"] {
        let tail = &bytes[i..];
        if tail.len() >= word.len() && tail[..word.len()].eq_ignore_ascii_case(word.as_bytes()) {
            return i + word.len();
        }
    }

    let int_digits = count_digits(&bytes[i..]);
    i += int_digits;

    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        frac_digits = count_digits(&bytes[i + 1..]);
        if int_digits + frac_digits > 0 {
            i += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_digits = count_digits(&bytes[j.min(bytes.len())..]);
        if exp_digits > 0 {
            i = j + exp_digits;
        }
    }

    i
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
