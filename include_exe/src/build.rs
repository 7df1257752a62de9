//! Build-time encoder and build-script helpers for `include_exe`.
use std::{
    collections::hash_map::DefaultHasher,
    env, fs,
    hash::{Hash, Hasher},
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::write::EncoderWriter;
use quote::ToTokens;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{EmbeddedArtifact, decode::PAYLOAD_ENGINE, verify::Digests};

//
// ==================== PUBLIC BUILDER API ====================
//

/// A builder for encoding an executable into an artifact source file.
///
/// This provides a clean, high-level API for use in `build.rs` scripts and in the
/// `include-exe` generator.
///
/// # Example
/// ```no_run
/// // in build.rs
/// include_exe::Config::new("bin/helper")
///   .version("1.4.2")
///   .build()
///   .expect("Failed to embed helper");
/// ```
#[derive(Debug)]
pub struct Config {
    path: PathBuf,
    name: Option<String>,
    version: String,
    cfg: Option<String>,
    level: i32,
}

impl Config {
    /// Creates a new configuration for the executable at `path`.
    ///
    /// In build scripts the path is relative to the crate root (`CARGO_MANIFEST_DIR`) and
    /// must be spelled the same way in the [`include_exe!`](crate::include_exe) call.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: None,
            version: String::new(),
            cfg: None,
            level: MAX_COMPRESSION_LEVEL,
        }
    }

    /// Sets the executable file name recorded in the artifact.
    ///
    /// Defaults to the file name of the source path.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the version string recorded in the artifact.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Gates every generated item behind `#[cfg(predicate)]`, e.g. `target_os = "linux"`.
    #[must_use]
    pub fn cfg(mut self, predicate: impl Into<String>) -> Self {
        self.cfg = Some(predicate.into());
        self
    }

    /// Sets the zstd compression level (1-22).
    ///
    /// If not set, the maximum level, [`MAX_COMPRESSION_LEVEL`], is used.
    #[must_use]
    pub const fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Encodes the executable and writes the rendered artifact to `dest`.
    ///
    /// The destination is created exclusively and is never overwritten.
    ///
    /// # Errors
    /// Returns [`Error::DestinationExists`] if `dest` exists, and any [`Error`] from
    /// encoding, rendering or writing.
    pub fn write_to(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        // Fail fast before spending time on maximum-level compression.
        if dest.exists() {
            return Err(Error::DestinationExists(dest.to_path_buf()));
        }

        let encoded = encode(&self.path, self.level)?;
        let text = encoded.render(&self.header()?)?;
        write_atomic(dest, text.as_bytes(), Replace::Never)?;

        info!(
            source = %self.path.display(),
            artifact = %dest.display(),
            decoded_len = encoded.decoded_len(),
            payload_len = encoded.payload().len(),
            "wrote embedded executable artifact"
        );
        Ok(dest.to_path_buf())
    }

    /// Runs the encoder from a build script.
    ///
    /// The artifact lands in `OUT_DIR` under a name derived from the source path and its
    /// modification time, which is where [`include_exe!`](crate::include_exe) looks for
    /// it. An existing artifact is kept only if it matches the current settings byte for
    /// byte; otherwise it is atomically replaced.
    ///
    /// # Errors
    /// Returns an [`Error`] if a Cargo variable is missing, the source is not a regular
    /// file, or encoding fails.
    pub fn build(self) -> Result<()> {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .map_err(|_| Error::Var("CARGO_MANIFEST_DIR"))?;
        let out_dir = env::var("OUT_DIR")
            .map(PathBuf::from)
            .map_err(|_| Error::Var("OUT_DIR"))?;

        let canonical_path = self.build_in(&manifest_dir, &out_dir)?;
        println!("cargo:rerun-if-changed={}", canonical_path.display());
        // Tells the macro that the build script ran and where to look.
        println!("cargo:rustc-env=INCLUDE_EXE_ARTIFACT_DIR={}", out_dir.display());
        Ok(())
    }

    /// Writes or refreshes the artifact for `self.path` in `out_dir`.
    ///
    /// Returns the canonical source path.
    fn build_in(self, manifest_dir: &Path, out_dir: &Path) -> Result<PathBuf> {
        let source = manifest_dir.join(&self.path);
        let canonical_path = source.canonicalize().map_err(|_| {
            Error::PathNotFound(
                self.path.display().to_string(),
                manifest_dir.display().to_string(),
            )
        })?;

        let metadata = fs::metadata(&canonical_path)?;
        if !metadata.is_file() {
            return Err(Error::UnsupportedFileType(self.path.display().to_string()));
        }

        let unique_name = artifact_name(manifest_dir, &canonical_path, &metadata)?;
        let dest = out_dir.join(format!("{unique_name}.rs"));
        // The file name cannot carry name, version, cfg or level, so compare contents.
        let header = self.header()?;
        let encoded = encode(&canonical_path, self.level)?;
        let text = encoded.render(&header)?;
        match fs::read(&dest) {
            Ok(existing) if existing == text.as_bytes() => {
                debug!(artifact = %dest.display(), "artifact is up to date");
            }
            Ok(_) => {
                write_atomic(&dest, text.as_bytes(), Replace::Stale)?;
                info!(artifact = %dest.display(), "replaced stale embedded executable artifact");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                write_atomic(&dest, text.as_bytes(), Replace::Never)?;
                info!(
                    source = %canonical_path.display(),
                    artifact = %dest.display(),
                    decoded_len = encoded.decoded_len(),
                    "wrote embedded executable artifact"
                );
            }
            Err(source) => return Err(Error::Read { path: dest, source }),
        }
        Ok(canonical_path)
    }

    fn header(&self) -> Result<Header> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Error::UnsupportedFileType(self.path.display().to_string()))?,
        };
        Ok(Header {
            name,
            version: self.version.clone(),
            cfg: self.cfg.clone(),
        })
    }
}

/// The maximum zstd compression level, used unless [`Config::level`] says otherwise.
pub const MAX_COMPRESSION_LEVEL: i32 = 22;

/// Payload characters per line in a rendered artifact.
const PAYLOAD_LINE_WIDTH: usize = 80;

/// A specialized `Result` type for encoder and build script operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while encoding an executable or writing its artifact.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("could not read '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("compression failed")]
    Compression(#[source] io::Error),
    #[error("text encoding failed")]
    Encoding(#[source] io::Error),
    #[error("destination '{}' already exists", .0.display())]
    DestinationExists(PathBuf),
    #[error("could not write '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Environment variable '{0}' not set by Cargo")]
    Var(&'static str),
    #[error("Path '{0}' not found (crate root is '{1}')")]
    PathNotFound(String, String),
    #[error("Path '{0}' is not a regular file")]
    UnsupportedFileType(String),
    #[error("cfg predicate {0:?} is not a single meta item")]
    InvalidCfg(String),
}

//
// ==================== ENCODER ====================
//

/// Metadata written into the header constants of a rendered artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Executable file name.
    pub name: String,
    /// Version of the executable; may be empty.
    pub version: String,
    /// Optional `cfg` predicate applied to every generated item.
    pub cfg: Option<String>,
}

/// An executable encoded into its embeddable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    decoded_len: usize,
    digests: Digests,
    sha1_hex: String,
    sha256_hex: String,
    payload: String,
}

impl EncodedArtifact {
    /// Length of the original executable in bytes.
    #[must_use]
    pub const fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Digests of the original executable.
    #[must_use]
    pub const fn digests(&self) -> &Digests {
        &self.digests
    }

    /// The compressed, base64-encoded payload without line breaks.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Borrows this encoding as a runtime artifact.
    #[must_use]
    pub fn as_embedded<'a>(&'a self, name: &'a str, version: &'a str) -> EmbeddedArtifact<'a> {
        EmbeddedArtifact::new(
            self.decoded_len,
            name,
            version,
            &self.sha1_hex,
            &self.sha256_hex,
            &self.payload,
        )
    }

    /// Renders the artifact as Rust source defining `DECODED_LEN`, `NAME`, `VERSION`,
    /// `SHA1`, `SHA256` and `PAYLOAD`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCfg`] if the cfg predicate is not a single meta item.
    pub fn render(&self, header: &Header) -> Result<String> {
        let cfg = match &header.cfg {
            Some(predicate) => format!("#[cfg({})]\n", cfg_predicate(predicate)?),
            None => String::new(),
        };

        let mut out = String::with_capacity(self.payload.len() + 1024);
        out.push_str("// MACHINE GENERATED BY include-exe. DO NOT EDIT.\n//\n");
        out.push_str(&format!(
            "// Embedded executable `{}`: {} bytes, zstd-compressed and\n\
             // base64-encoded without padding.\n\n",
            header.name.escape_debug(),
            self.decoded_len
        ));

        let mut item = |doc: &str, decl: String| {
            out.push_str(&format!("/// {doc}\n{cfg}{decl}\n"));
        };
        item(
            "Length of the decoded executable in bytes.",
            format!("pub const DECODED_LEN: usize = {};", self.decoded_len),
        );
        item(
            "File name of the embedded executable.",
            format!("pub const NAME: &str = {:?};", header.name),
        );
        item(
            "Version of the embedded executable.",
            format!("pub const VERSION: &str = {:?};", header.version),
        );
        item(
            "Hex-encoded SHA-1 digest of the decoded executable.",
            format!("pub const SHA1: &str = \"{}\";", self.sha1_hex),
        );
        item(
            "Hex-encoded SHA-256 digest of the decoded executable.",
            format!("pub const SHA256: &str = \"{}\";", self.sha256_hex),
        );

        let mut payload = String::with_capacity(self.payload.len() + self.payload.len() / 64 + 2);
        payload.push('\n');
        for line in self.payload.as_bytes().chunks(PAYLOAD_LINE_WIDTH) {
            // Base64 output is pure ASCII, so every chunk is valid UTF-8.
            payload.push_str(&String::from_utf8_lossy(line));
            payload.push('\n');
        }
        item(
            "The executable, zstd-compressed and base64-encoded.",
            format!("pub const PAYLOAD: &str = r\"{payload}\";"),
        );
        Ok(out)
    }
}

/// Parses `predicate` as a `cfg` meta item and returns its normalized token form.
///
/// Only the normalized form is rendered, so comments or stray delimiters in the input
/// can never leak into the generated file.
fn cfg_predicate(predicate: &str) -> Result<String> {
    syn::parse_str::<syn::Meta>(predicate)
        .map(|meta| meta.to_token_stream().to_string())
        .map_err(|_| Error::InvalidCfg(predicate.to_owned()))
}

/// Reads the executable at `path` and encodes it at the given zstd `level`.
///
/// # Errors
/// Returns [`Error::Read`] if the file cannot be read, and any error from
/// [`encode_bytes`].
pub fn encode(path: impl AsRef<Path>, level: i32) -> Result<EncodedArtifact> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(source = %path.display(), len = bytes.len(), "read executable");
    encode_bytes(&bytes, level)
}

/// Encodes `bytes` at the given zstd `level`.
///
/// The result depends only on `bytes` and `level`.
///
/// # Errors
/// Returns [`Error::Compression`] if the zstd stage fails and [`Error::Encoding`] if
/// the base64 stage cannot finish.
pub fn encode_bytes(bytes: &[u8], level: i32) -> Result<EncodedArtifact> {
    let digests = Digests::of(bytes);

    let text = EncoderWriter::new(Vec::new(), &PAYLOAD_ENGINE);
    let mut compressor =
        zstd::stream::write::Encoder::new(text, level).map_err(Error::Compression)?;
    compressor
        .include_checksum(true)
        .map_err(Error::Compression)?;
    compressor
        .set_pledged_src_size(Some(bytes.len() as u64))
        .map_err(Error::Compression)?;
    compressor.write_all(bytes).map_err(Error::Compression)?;
    let mut text = compressor.finish().map_err(Error::Compression)?;

    let payload = text.finish().map_err(Error::Encoding)?;
    let payload = String::from_utf8(payload)
        .map_err(|err| Error::Encoding(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    debug!(
        decoded_len = bytes.len(),
        payload_len = payload.len(),
        level,
        "encoded executable"
    );

    Ok(EncodedArtifact {
        decoded_len: bytes.len(),
        sha1_hex: digests.sha1_hex(),
        sha256_hex: digests.sha256_hex(),
        digests,
        payload,
    })
}

/// Derives the `OUT_DIR` artifact name shared with the `include_exe!` macro.
///
/// Keep in sync with `artifact_name` in `include_exe_macros`.
fn artifact_name(
    manifest_dir: &Path,
    canonical_path: &Path,
    metadata: &fs::Metadata,
) -> Result<String> {
    let manifest_dir = manifest_dir.canonicalize()?;
    let path_for_hashing = canonical_path
        .strip_prefix(&manifest_dir)
        .unwrap_or(canonical_path)
        .to_path_buf();

    let mut hasher = DefaultHasher::new();
    path_for_hashing.hash(&mut hasher);
    metadata.modified()?.hash(&mut hasher);
    Ok(format!("include_exe_{:016x}", hasher.finish()))
}

/// Whether [`write_atomic`] may replace an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replace {
    Never,
    Stale,
}

/// Writes `contents` to a temporary file next to `dest`, then moves it into place.
///
/// A failed write never leaves a partial `dest` behind.
fn write_atomic(dest: &Path, contents: &[u8], replace: Replace) -> Result<()> {
    let write_err = |source| Error::Write {
        path: dest.to_path_buf(),
        source,
    };
    let dir = dest
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(write_err)?;

    let persisted = match replace {
        Replace::Never => file.persist_noclobber(dest),
        Replace::Stale => file.persist(dest),
    };
    persisted.map(drop).map_err(|err| {
        if err.error.kind() == io::ErrorKind::AlreadyExists {
            Error::DestinationExists(dest.to_path_buf())
        } else {
            write_err(err.error)
        }
    })
}
