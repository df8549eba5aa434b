//! SHA-1 hashing write adapter.

use std::io::{self, Write};

use sha1::{Digest as _, Sha1};

use chasm_types::Digest;

/// Wraps a writer and hashes exactly the bytes the writer accepts, so the
/// digest is computed while writing rather than from a second pass.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha1,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
            written: 0,
        }
    }

    /// Total bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Finalize the digest and return the underlying writer.
    pub fn finish(self) -> (W, Digest) {
        (self.inner, Digest::from_raw(self.hasher.finalize().into()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
