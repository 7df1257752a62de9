//! Runtime errors for decoding, materializing and verifying an embedded executable.
use std::{io, path::PathBuf};

/// A specialized `Result` type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while decoding, writing or verifying an embedded executable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to initialize the payload decoder")]
    DecodeInit(#[source] io::Error),
    #[error("failed to read the decoded payload")]
    DecodeRead(#[source] io::Error),
    #[error("embedded payload is truncated: expected {expected} bytes, decoded {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("embedded payload decodes to more than the expected {expected} bytes")]
    Overrun { expected: usize },
    #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        algorithm: &'static str,
        expected: String,
        actual: String,
    },
    #[error("destination '{}' already exists", .0.display())]
    DestinationExists(PathBuf),
    #[error("could not create '{}'", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write executable to '{}'", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not finalize '{}'", path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not read '{}' for verification", path.display())]
    Verify {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns `true` when the error means the embedded artifact itself is corrupt.
    ///
    /// These errors are deterministic: retrying the operation produces the same fault.
    #[must_use]
    pub const fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::Overrun { .. } | Self::DigestMismatch { .. }
        )
    }
}
