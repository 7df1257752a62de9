//! Ship a companion executable inside your program instead of downloading it.
//!
//! This crate embeds an executable as a compile-time constant and writes it back to
//! disk on demand, with both a SHA-1 and a SHA-256 digest recorded so the result can be
//! verified byte for byte.
//!
//! ## How It Works
//!
//! 1.  **Build Script:** You use the [`build::Config`] builder in your `build.rs` script.
//!     It reads the executable, records its length and digests, compresses it with
//!     `zstd` at the maximum level, base64-encodes the result and renders a Rust source
//!     file of constants into `OUT_DIR`.
//! 2.  **Macro Expansion:** The [`include_exe!`] macro includes that file and expands to a
//!     `const` [`EmbeddedArtifact`], so it can live in a `static`.
//! 3.  **Runtime:** [`EmbeddedArtifact::bytes`], [`EmbeddedArtifact::open_stream`] and
//!     [`EmbeddedArtifact::write_file`] decode the payload on every call. Nothing is
//!     cached and nothing is shared between calls.
//!
//! The same artifact file can be produced ahead of time with the `include-exe` binary
//! (feature `cli`) and pulled in with `include!`.
//!
//! ## Usage
//!
//! 1. Add `include_exe` to your `Cargo.toml`. The `build` feature is required for
//!    build-dependencies.
//!
//! ```toml
//! [dependencies]
//! include_exe = "0.1.0"
//!
//! [build-dependencies]
//! include_exe = { version = "0.1.0", features = ["build"] }
//! ```
//!
//! 2. Create a `build.rs` file in your project root to encode the executable.
//!
//! ```ignore
//! // build.rs
//! include_exe::Config::new("bin/helper")
//!   .version("1.4.2") // Recorded for sanity checks after materializing (optional)
//!   .build()
//!   .expect("Failed to embed helper");
//! ```
//!
//! 3. Use the macro in your code and write the executable out when you need it.
//!
//! ```ignore
//! // src/main.rs
//! use include_exe::{EmbeddedArtifact, include_exe};
//!
//! static HELPER: EmbeddedArtifact = include_exe!("bin/helper");
//!
//! # fn main() -> include_exe::Result<()> {
//! let path = std::env::temp_dir().join(HELPER.name());
//! HELPER.write_file(&path)?;
//! HELPER.verify_file(&path)?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/include_exe/0.1.0")]

// Re-export the procedural macro.
pub use include_exe_macros::include_exe;

//
// ===== RUNTIME CODE =====
//

mod artifact;
mod decode;
mod error;
pub mod verify;

pub use artifact::EmbeddedArtifact;
pub use decode::ExeReader;
pub use error::{Error, Result};
pub use verify::Digests;

//
// ===== BUILD-TIME CODE =====
//

#[cfg(feature = "build")]
pub mod build;
#[cfg(feature = "build")]
pub use build::Config;
