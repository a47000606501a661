#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Command-line front end for the `fastcsum` library.
//!
//! Without operands the binary prints which checksum features were compiled
//! in, which the CPU offers and which kernels can therefore run. With `FILE`
//! operands it prints the Internet checksum of each file, `-` meaning
//! standard input.
//!
//! [`run`] takes the argument list and output sinks explicitly so the
//! binary wrapper stays trivial and the behaviour can be exercised in-process.

mod command;
mod cpu;
mod files;
mod logging;
mod report;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use fastcsum::{ChecksumError, Dispatcher, Kernel};
use thiserror::Error;

pub use command::Options;
pub use cpu::CpuInfo;
pub use files::{FileChecksum, STDIN_OPERAND, wire_value};
pub use report::{FeatureRow, KernelRow, Report};

/// Name the binary reports in help and diagnostics.
pub const PROGRAM_NAME: &str = "fastcsum";

/// Exit status for runtime failures.
const EXIT_FAILURE: u8 = 1;
/// Exit status for command-line usage errors.
const EXIT_USAGE: u8 = 2;

/// Failures that end a `fastcsum` invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// The arguments could not be parsed.
    #[error(transparent)]
    Usage(#[from] clap::Error),
    /// The requested kernel is unknown or cannot run here.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    /// Writing to standard output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    /// Serialising the JSON report failed.
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Runs the command line and returns the process exit status.
pub fn run<I, S, O, E>(args: I, stdout: &mut O, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
    O: Write,
    E: Write,
{
    let options = match command::parse(args) {
        Ok(options) => options,
        Err(err) if !err.use_stderr() => {
            return match write!(stdout, "{}", err.render()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(io) => fail(stderr, &CliError::Output(io)),
            };
        }
        Err(err) => return fail(stderr, &CliError::Usage(err)),
    };

    logging::init(options.verbosity);

    match execute(&options, stdout, stderr) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(err) => fail(stderr, &err),
    }
}

/// Reports `err` on stderr. A failed write there has nowhere left to go, so
/// the exit status alone carries the failure.
fn fail<E: Write>(stderr: &mut E, err: &CliError) -> ExitCode {
    let _ = match err {
        CliError::Usage(usage) => write!(stderr, "{}", usage.render()),
        other => writeln!(stderr, "{PROGRAM_NAME}: {other}"),
    };
    ExitCode::from(err.exit_code())
}

fn resolve_kernel(requested: Option<&str>) -> Result<Kernel, CliError> {
    let Some(name) = requested else {
        return Ok(fastcsum::global().kernel());
    };
    let kernel = Dispatcher::with_kernel(name.parse()?)?.kernel();
    tracing::debug!(%kernel, "using kernel requested on the command line");
    Ok(kernel)
}

/// Returns `Ok(false)` when at least one operand could not be checksummed.
fn execute<O: Write, E: Write>(
    options: &Options,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<bool, CliError> {
    let kernel = resolve_kernel(options.kernel.as_deref())?;

    if options.list_kernels {
        let report = Report::collect(kernel);
        if options.json {
            write_json(stdout, &report.kernels)?;
        } else {
            report.write_kernels(stdout)?;
        }
        return Ok(true);
    }

    if options.files.is_empty() {
        let report = Report::collect(kernel);
        if options.json {
            write_json(stdout, &report)?;
        } else {
            report.write_text(stdout)?;
        }
        return Ok(true);
    }

    let mut ok = true;
    let mut results = Vec::with_capacity(options.files.len());
    let mut stdin = io::stdin().lock();
    for operand in &options.files {
        match files::checksum_operand(operand, &mut stdin, kernel) {
            Ok(result) => {
                tracing::debug!(path = %result.path, bytes = result.bytes, "checksummed");
                if options.json {
                    results.push(result);
                } else {
                    writeln!(stdout, "0x{}  {}", result.checksum, result.path)?;
                }
            }
            Err(err) => {
                ok = false;
                writeln!(stderr, "{PROGRAM_NAME}: {}: {err}", operand.to_string_lossy())?;
            }
        }
    }
    if options.json {
        write_json(stdout, &results)?;
    }
    Ok(ok)
}

fn write_json<O: Write, T: serde::Serialize + ?Sized>(
    stdout: &mut O,
    value: &T,
) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
