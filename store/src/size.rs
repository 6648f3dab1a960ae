//! Serialized-size estimates used to gate chunking and to warn about
//! payloads approaching a backend quota.

use serde::Serialize;

use crate::types::Prompt;

pub const BYTES_PER_KB: f64 = 1024.0;

/// `io::Write` sink that only counts bytes, so sizing never allocates the
/// encoded form.
#[derive(Default)]
struct ByteCounter(usize);

impl std::io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// UTF-8 byte length of the compact JSON encoding of `value`.
pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> Result<usize, serde_json::Error> {
    let mut counter = ByteCounter::default();
    serde_json::to_writer(&mut counter, value)?;
    Ok(counter.0)
}

pub fn to_kb(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_KB
}

/// Serialized size of a prompt in KB.
pub fn size_kb(prompt: &Prompt) -> f64 {
    // Prompt has only string keys and plain fields; encoding cannot fail.
    to_kb(encoded_len(prompt).unwrap_or_default())
}
