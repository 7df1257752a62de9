//! Procedural macro implementation for the `include_exe` crate. Do not use directly.
use std::{
    collections::hash_map::DefaultHasher,
    env, fs,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Ident, LitStr, parse_macro_input};

/// Embeds an executable that was encoded by the build script.
///
/// This macro takes a single string literal: the path of the executable relative to the
/// crate root (`CARGO_MANIFEST_DIR`), spelled exactly as it was passed to
/// `include_exe::Config::new` in `build.rs`.
///
/// It expands to a constant expression of type `include_exe::EmbeddedArtifact<'static>`,
/// suitable for initializing a `static`.
///
/// # Build Dependencies
///
/// This macro requires a `build.rs` script for the consuming crate that runs
/// `include_exe::Config::new(path).build()` for every embedded executable.
///
/// # Panics
///
/// This macro will cause a compilation failure if:
/// - The build script has not been run.
/// - The specified file path does not exist.
/// - The build script did not generate an artifact for this path.
#[proc_macro]
pub fn include_exe(input: TokenStream) -> TokenStream {
    let lit_str = parse_macro_input!(input as LitStr);

    // The build script sets this variable to the directory holding its artifacts.
    env::var("INCLUDE_EXE_ARTIFACT_DIR").map_or_else(
        |_| {
            syn::Error::new(
                lit_str.span(),
                "include_exe: build script has not run. This is expected during analysis (e.g., by rust-analyzer).",
            )
            .to_compile_error()
            .into()
        },
        |artifact_dir| expand(&lit_str, Path::new(&artifact_dir)).into(),
    )
}

fn expand(lit_str: &LitStr, artifact_dir: &Path) -> TokenStream2 {
    let path_str = lit_str.value();
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            return syn::Error::new(
                lit_str.span(),
                "include_exe: CARGO_MANIFEST_DIR is not set; this macro must be run by Cargo.",
            )
            .to_compile_error();
        }
    };

    let unique_name = match artifact_name(&manifest_dir, &path_str) {
        Ok(name) => name,
        Err(msg) => return syn::Error::new(lit_str.span(), msg).to_compile_error(),
    };

    let artifact_path = artifact_dir.join(format!("{unique_name}.rs"));
    if !artifact_path.is_file() {
        let msg = format!(
            "include_exe: no artifact generated for '{path_str}'\nexpected at: {}\n\
             (is `include_exe::Config::new({path_str:?}).build()` in build.rs?)",
            artifact_path.display()
        );
        return syn::Error::new(lit_str.span(), msg).to_compile_error();
    }
    let artifact_path = artifact_path.display().to_string();

    let crate_name = match crate_name("include_exe") {
        Ok(FoundCrate::Name(name)) => Ident::new(&name, Span::call_site()),
        Ok(FoundCrate::Itself) => Ident::new("crate", Span::call_site()),
        Err(_) => Ident::new("include_exe", Span::call_site()), // Fallback
    };

    quote! {
        {
            mod __include_exe_artifact {
                include!(#artifact_path);
            }
            #crate_name::EmbeddedArtifact::new(
                __include_exe_artifact::DECODED_LEN,
                __include_exe_artifact::NAME,
                __include_exe_artifact::VERSION,
                __include_exe_artifact::SHA1,
                __include_exe_artifact::SHA256,
                __include_exe_artifact::PAYLOAD,
            )
        }
    }
}

/// Recomputes the artifact name chosen by the build script.
///
/// Keep in sync with `artifact_name` in `include_exe::build`.
fn artifact_name(manifest_dir: &Path, path_str: &str) -> Result<String, String> {
    let canonical_path = manifest_dir
        .join(path_str)
        .canonicalize()
        .map_err(|e| format!("include_exe: could not find file '{path_str}': {e}"))?;
    let manifest_dir = manifest_dir
        .canonicalize()
        .map_err(|e| format!("include_exe: could not resolve crate root: {e}"))?;
    let path_for_hashing = canonical_path
        .strip_prefix(&manifest_dir)
        .unwrap_or(&canonical_path)
        .to_path_buf();

    let modified_time = fs::metadata(&canonical_path)
        .and_then(|metadata| metadata.modified())
        .map_err(|e| {
            format!(
                "include_exe: could not read modification time for '{}': {e}",
                canonical_path.display()
            )
        })?;

    let mut hasher = DefaultHasher::new();
    path_for_hashing.hash(&mut hasher);
    modified_time.hash(&mut hasher);
    Ok(format!("include_exe_{:016x}", hasher.finish()))
}
