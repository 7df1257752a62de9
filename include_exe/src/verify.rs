//! Content digests used to tie decoded bytes back to the embedded artifact.
use std::io::{self, Read, Write};

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// The SHA-1 and SHA-256 digests of one byte sequence.
///
/// Both digests are always computed over the same uncompressed bytes, but they are
/// compared independently by [`Digests::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digests {
    /// 20-byte SHA-1 digest.
    pub sha1: [u8; 20],
    /// 32-byte SHA-256 digest.
    pub sha256: [u8; 32],
}

impl Digests {
    /// Computes both digests over `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            sha1: Sha1::digest(bytes).into(),
            sha256: Sha256::digest(bytes).into(),
        }
    }

    /// Computes both digests in a single pass over `reader`.
    ///
    /// # Errors
    /// Returns any I/O error produced by `reader`.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut sink = DigestWriter::default();
        io::copy(&mut reader, &mut sink)?;
        Ok(sink.finish())
    }

    /// Lowercase hex form of the SHA-1 digest.
    #[must_use]
    pub fn sha1_hex(&self) -> String {
        hex::encode(self.sha1)
    }

    /// Lowercase hex form of the SHA-256 digest.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    /// Compares these (actual) digests against `expected`.
    ///
    /// # Errors
    /// Returns [`Error::DigestMismatch`] naming the first algorithm that disagrees.
    pub fn check(&self, expected: &Self) -> Result<()> {
        if self.sha1 != expected.sha1 {
            return Err(Error::DigestMismatch {
                algorithm: "SHA-1",
                expected: expected.sha1_hex(),
                actual: self.sha1_hex(),
            });
        }
        if self.sha256 != expected.sha256 {
            return Err(Error::DigestMismatch {
                algorithm: "SHA-256",
                expected: expected.sha256_hex(),
                actual: self.sha256_hex(),
            });
        }
        Ok(())
    }
}

/// Feeds every write into both hashers.
#[derive(Default)]
struct DigestWriter {
    sha1: Sha1,
    sha256: Sha256,
}

impl DigestWriter {
    fn finish(self) -> Digests {
        Digests {
            sha1: self.sha1.finalize().into(),
            sha256: self.sha256.finalize().into(),
        }
    }
}

impl Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sha1.update(buf);
        self.sha256.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
