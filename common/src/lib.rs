//! Common building blocks of the `prsync` tool
//!
//! `prsync` copies files and directory trees from sources to destinations, many pairs at once,
//! with every transfer capped to a configured bandwidth.
//!
//! # Overview
//!
//! A run consists of a list of [`TransferRequest`]s handed to [`transfer::run_all`]. Each request
//! is executed by its own tokio task (a *worker*) which owns a [`throttle::RateLimiter`] and a
//! [`CopyEngine`]. Workers share a single [`ProgressRegistry`] where each one keeps a byte counter
//! under its worker id.
//!
//! # Copy semantics
//!
//! Only full files are transferred. A file is skipped when its destination exists and was
//! modified at the same time or after the source, so running the same copy twice does not
//! rewrite anything. Permission bits and timestamps are copied onto each file after its body.
//!
//! The shape of the paths decides where data lands:
//!
//! - a file copied onto an existing directory lands inside of it, otherwise at the destination
//!   path itself
//! - a directory given with a trailing slash (`src/`) has its contents merged into the
//!   destination
//! - a directory without a trailing slash (`src`) is copied as `destination/src`
//!
//! # Error handling
//!
//! Failures are reported as [`Error`] values carrying both paths of the failed copy and an
//! [`ErrorKind`]. Failing to copy a single entry of a directory tree is logged and counted, the
//! walk continues with the next entry. Problems with the request itself (missing source, a file
//! in place of the destination directory, unsupported source type) end that transfer. A failed
//! transfer never cancels the others.
//!
//! # Rate limiting
//!
//! The rate limiter drives the size of every read: a transfer never asks for more bytes than are
//! left in the budget of the current one-second window, and waits for the window to end once the
//! budget is spent.

pub mod config;
pub mod copy;
pub mod error;
pub mod path;
pub mod preserve;
pub mod progress;
pub mod transfer;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RuntimeConfig, TransferConfig};
pub use copy::{CopyEngine, Summary};
pub use error::{Error, ErrorKind};
pub use progress::{ProgressRegistry, ProgressSettings, ProgressType};
pub use transfer::TransferRequest;

fn log_level(output: &OutputConfig) -> tracing_subscriber::filter::LevelFilter {
    use tracing_subscriber::filter::LevelFilter;
    if output.quiet {
        return LevelFilter::OFF;
    }
    match output.verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_tracing(output: &OutputConfig) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(log_level(output).into())
        .from_env_lossy();
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

fn build_runtime(runtime: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    builder.build()
}

/// Sets up logging, progress reporting and the tokio runtime, then runs `func` to completion.
///
/// Returns `None` when anything failed; the error was already printed unless running quiet.
pub fn run<Fut, Summary, Error>(
    progress: Option<ProgressSettings>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce(std::sync::Arc<ProgressRegistry>) -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Error: std::fmt::Display,
    Fut: std::future::Future<Output = Result<Summary, Error>>,
{
    init_tracing(&output);
    let display = match progress::make_display(progress.as_ref()) {
        Ok(display) => display,
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            return None;
        }
    };
    let registry = std::sync::Arc::new(ProgressRegistry::new(display));
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            if !output.quiet {
                eprintln!("failed to start the async runtime: {error}");
            }
            return None;
        }
    };
    let res = runtime.block_on(func(registry));
    match res {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        use tracing_subscriber::filter::LevelFilter;
        let output = |quiet, verbose| OutputConfig {
            quiet,
            verbose,
            print_summary: false,
        };
        assert_eq!(log_level(&output(false, 0)), LevelFilter::ERROR);
        assert_eq!(log_level(&output(false, 1)), LevelFilter::INFO);
        assert_eq!(log_level(&output(false, 2)), LevelFilter::DEBUG);
        assert_eq!(log_level(&output(false, 5)), LevelFilter::TRACE);
        assert_eq!(log_level(&output(true, 3)), LevelFilter::OFF);
    }

    #[test]
    fn runtime_honors_thread_limits() {
        let runtime = build_runtime(&RuntimeConfig {
            max_workers: 2,
            max_blocking_threads: 4,
        })
        .unwrap();
        assert_eq!(runtime.metrics().num_workers(), 2);
    }
}
