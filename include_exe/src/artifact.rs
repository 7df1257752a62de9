//! The compiled-in artifact and everything a program does with it at run time.
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::Path,
};

use tracing::{debug, warn};

use crate::{
    decode::ExeReader,
    error::{Error, Result},
    verify::Digests,
};

/// An executable embedded in the program as compressed, text-encoded data.
///
/// Values are usually produced by the [`include_exe!`](crate::include_exe) macro and kept in a
/// `static`. The artifact is immutable; every operation builds its own decode pipeline, so a
/// single artifact can be used from many threads at once.
///
/// # Example
/// ```ignore
/// use include_exe::{EmbeddedArtifact, include_exe};
///
/// static HELPER: EmbeddedArtifact = include_exe!("bin/helper");
///
/// # fn main() -> include_exe::Result<()> {
/// HELPER.write_file("/tmp/helper")?;
/// HELPER.verify_file("/tmp/helper")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedArtifact<'a> {
    decoded_len: usize,
    name: &'a str,
    version: &'a str,
    sha1_hex: &'a str,
    sha256_hex: &'a str,
    payload: &'a str,
}

impl<'a> EmbeddedArtifact<'a> {
    /// Assembles an artifact from the constants of a generated artifact file.
    ///
    /// Nothing is validated here; a corrupt artifact surfaces when it is decoded or its
    /// digests are read.
    #[must_use]
    pub const fn new(
        decoded_len: usize,
        name: &'a str,
        version: &'a str,
        sha1_hex: &'a str,
        sha256_hex: &'a str,
        payload: &'a str,
    ) -> Self {
        Self {
            decoded_len,
            name,
            version,
            sha1_hex,
            sha256_hex,
            payload,
        }
    }

    /// Length of the decoded executable in bytes.
    #[must_use]
    pub const fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Platform file name of the executable (`helper` on Unix, `helper.exe` on Windows).
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// Version string of the embedded executable, empty when none was recorded.
    #[must_use]
    pub const fn version(&self) -> &'a str {
        self.version
    }

    /// Opens a stream over the decoded executable.
    ///
    /// # Errors
    /// Returns [`Error::DecodeInit`] if the decompression stage cannot be set up.
    pub fn open_stream(&self) -> Result<ExeReader<'a>> {
        debug!(name = self.name, "opening embedded executable stream");
        ExeReader::new(self.payload).map_err(Error::DecodeInit)
    }

    /// Decodes the whole executable into memory.
    ///
    /// # Errors
    /// Returns [`Error::DecodeRead`] if the payload cannot be decoded, and
    /// [`Error::Truncated`] or [`Error::Overrun`] if it does not decode to exactly
    /// [`decoded_len`](Self::decoded_len) bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let expected = self.decoded_len;
        let mut buf = Vec::with_capacity(expected);
        // One byte past the expected length is enough to detect an overrun.
        let limit = u64::try_from(expected).map_or(u64::MAX, |len| len.saturating_add(1));
        self.open_stream()?
            .take(limit)
            .read_to_end(&mut buf)
            .map_err(Error::DecodeRead)?;

        match buf.len() {
            actual if actual < expected => Err(Error::Truncated { expected, actual }),
            actual if actual > expected => Err(Error::Overrun { expected }),
            _ => Ok(buf),
        }
    }

    /// SHA-1 digest of the decoded executable, as recorded at encode time.
    ///
    /// # Panics
    /// Panics if the stored digest is not 40 hex characters. That can only happen when the
    /// generated artifact was corrupted or edited by hand.
    #[must_use]
    pub fn sha1(&self) -> [u8; 20] {
        decode_stored_hex(self.sha1_hex, "SHA-1")
    }

    /// SHA-256 digest of the decoded executable, as recorded at encode time.
    ///
    /// # Panics
    /// Panics if the stored digest is not 64 hex characters. That can only happen when the
    /// generated artifact was corrupted or edited by hand.
    #[must_use]
    pub fn sha256(&self) -> [u8; 32] {
        decode_stored_hex(self.sha256_hex, "SHA-256")
    }

    /// Both recorded digests.
    ///
    /// # Panics
    /// See [`sha1`](Self::sha1) and [`sha256`](Self::sha256).
    #[must_use]
    pub fn digests(&self) -> Digests {
        Digests {
            sha1: self.sha1(),
            sha256: self.sha256(),
        }
    }

    /// Checks `bytes` against the recorded digests.
    ///
    /// # Errors
    /// Returns [`Error::DigestMismatch`] if either digest differs.
    pub fn verify_bytes(&self, bytes: &[u8]) -> Result<()> {
        Digests::of(bytes).check(&self.digests())
    }

    /// Streams the file at `path` and checks it against the recorded digests.
    ///
    /// # Errors
    /// Returns [`Error::Verify`] if the file cannot be read and
    /// [`Error::DigestMismatch`] if either digest differs.
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let verify_err = |source| Error::Verify {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(verify_err)?;
        let actual = Digests::of_reader(file).map_err(verify_err)?;
        actual.check(&self.digests())
    }

    /// Writes the executable to a new file at `path` and marks it executable.
    ///
    /// The file is created exclusively: an existing path is never overwritten. If writing
    /// fails part way, the partial file is removed before the error is returned.
    ///
    /// # Errors
    /// - [`Error::DestinationExists`] if `path` already exists.
    /// - [`Error::Open`] if the file cannot be created.
    /// - [`Error::DecodeInit`] if the payload decoder cannot be set up.
    /// - [`Error::Copy`] if decoding or writing fails.
    /// - [`Error::Close`] if the written data cannot be flushed to disk.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut reader = self.open_stream()?;
        let file = create_executable(path)?;
        debug!(path = %path.display(), "materializing embedded executable");

        let file = copy_or_remove(&mut reader, file, path)?;
        if let Err(source) = file.sync_all() {
            drop(file);
            remove_partial(path);
            return Err(Error::Close {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }
}

fn decode_stored_hex<const N: usize>(stored: &str, algorithm: &str) -> [u8; N] {
    let mut out = [0u8; N];
    hex::decode_to_slice(stored, &mut out).unwrap_or_else(|err| {
        panic!("BUG: include_exe: stored {algorithm} digest {stored:?} is malformed: {err}")
    });
    out
}

/// Creates `path` exclusively with owner, group and other execute permission.
fn create_executable(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }

    options.open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            Error::DestinationExists(path.to_path_buf())
        } else {
            Error::Open {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Copies `reader` into `writer`, which must be the open handle for `path`.
///
/// On failure the handle is closed and `path` removed.
fn copy_or_remove<R: Read, W: Write>(reader: &mut R, mut writer: W, path: &Path) -> Result<W> {
    match io::copy(reader, &mut writer).and_then(|n| writer.flush().map(|()| n)) {
        Ok(written) => {
            debug!(path = %path.display(), bytes = written, "embedded executable written");
            Ok(writer)
        }
        Err(source) => {
            drop(writer);
            remove_partial(path);
            Err(Error::Copy {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove partially written file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes `limit` bytes, then fails.
    #[derive(Debug)]
    struct FailAfter<W> {
        inner: W,
        limit: usize,
    }

    impl<W: Write> Write for FailAfter<W> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.limit == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.limit);
            let written = self.inner.write(&buf[..n])?;
            self.limit -= written;
            Ok(written)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn failed_copy_removes_destination() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("helper");
        let file = create_executable(&path).expect("create");
        let writer = FailAfter {
            inner: file,
            limit: 4,
        };

        let mut source: &[u8] = b"more than four bytes";
        let err = copy_or_remove(&mut source, writer, &path).expect_err("copy must fail");

        assert!(matches!(err, Error::Copy { .. }), "unexpected error: {err:?}");
        assert!(!path.exists(), "partial file was left behind");
    }

    #[test]
    fn create_refuses_existing_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("helper");
        fs::write(&path, b"keep me").expect("seed file");

        let err = create_executable(&path).expect_err("must not clobber");
        assert!(matches!(err, Error::DestinationExists(ref p) if *p == path));
        assert_eq!(fs::read(&path).expect("read back"), b"keep me");
    }

    #[cfg(unix)]
    #[test]
    fn created_file_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("helper");
        drop(create_executable(&path).expect("create"));

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_ne!(mode & 0o100, 0, "owner execute bit missing: {mode:o}");
    }

    #[test]
    #[should_panic(expected = "stored SHA-1 digest")]
    fn malformed_stored_hex_panics() {
        let artifact = EmbeddedArtifact::new(0, "helper", "", "zz", "", "");
        let _ = artifact.sha1();
    }

    #[test]
    #[should_panic(expected = "stored SHA-256 digest")]
    fn short_stored_hex_panics() {
        let artifact = EmbeddedArtifact::new(0, "helper", "", "", "abcd", "");
        let _ = artifact.sha256();
    }
}
