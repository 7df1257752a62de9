//! `include-exe`: encode an executable into an artifact source file ahead of time.
//!
//! ```text
//! include-exe --name helper --exe-version 1.4.2 ./helper src/helper_artifact.rs
//! ```
//!
//! The generated file defines the artifact constants and can be pulled into a crate with
//! `include!` and turned into an `include_exe::EmbeddedArtifact` with
//! `EmbeddedArtifact::new`.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use include_exe::build::{Config, MAX_COMPRESSION_LEVEL};
use tracing_subscriber::EnvFilter;

/// Encode an executable as an embeddable Rust artifact
#[derive(Parser, Debug)]
#[command(name = "include-exe", version)]
struct Cli {
    /// Executable to embed
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Artifact source file to create (must not exist)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// File name recorded in the artifact (defaults to the input file name)
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Gate every generated item behind `#[cfg(PREDICATE)]`
    #[arg(long, value_name = "PREDICATE")]
    cfg: Option<String>,

    /// Version string of the embedded executable
    #[arg(long = "exe-version", value_name = "VERSION")]
    exe_version: Option<String>,

    /// zstd compression level
    #[arg(
        long,
        default_value_t = MAX_COMPRESSION_LEVEL,
        value_parser = clap::value_parser!(i32).range(1..=i64::from(MAX_COMPRESSION_LEVEL)),
        value_name = "LEVEL"
    )]
    level: i32,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(&self.input).level(self.level);
        if let Some(name) = &self.name {
            config = config.name(name);
        }
        if let Some(predicate) = &self.cfg {
            config = config.cfg(predicate);
        }
        if let Some(version) = &self.exe_version {
            config = config.version(version);
        }
        config
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.config().write_to(&cli.output) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            ExitCode::FAILURE
        }
    }
}

/// Joins an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Initialize the tracing subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("include_exe=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn requires_exactly_two_positionals() {
        assert!(Cli::try_parse_from(["include-exe", "in"]).is_err());
        assert!(Cli::try_parse_from(["include-exe", "in", "out", "extra"]).is_err());

        let cli = Cli::try_parse_from(["include-exe", "--name", "helper.exe", "in", "out"])
            .expect("valid arguments");
        assert_eq!(cli.name.as_deref(), Some("helper.exe"));
        assert_eq!(cli.level, MAX_COMPRESSION_LEVEL);
    }

    #[test]
    fn rejects_out_of_range_level() {
        assert!(Cli::try_parse_from(["include-exe", "--level", "30", "in", "out"]).is_err());
    }

    #[test]
    fn error_chain_reports_every_cause() {
        let err = include_exe::build::Error::Read {
            path: "in".into(),
            source: std::io::Error::other("permission denied"),
        };
        assert_eq!(error_chain(&err), "could not read 'in': permission denied");
    }
}
