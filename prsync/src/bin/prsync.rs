use anyhow::anyhow;
use clap::Parser;
use tracing::instrument;

use prsync_tools_prsync::pairs;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "prsync",
    version,
    about = "Copy files and directory trees with a bandwidth cap, many source/destination pairs at once",
    long_about = "`prsync` copies files and directory trees similar to `rsync`, always transferring whole files.

A file is copied only when its destination is missing or older than the source. Permission bits and timestamps are copied along with the contents, so running the same copy again skips everything that did not change.

A directory written with a trailing slash (`src/`) has its contents copied into the destination, without it (`src`) the directory itself is created inside the destination. A file copied onto an existing directory lands inside of it.

EXAMPLES:
    # Copy two trees at once, each limited to 512 KB/s
    prsync --pairs /data/a:/backup,/data/b/:/backup/b --bandwidth 512 --progress

    # Copy a single file and print a summary
    prsync --pairs notes.txt:/mnt/usb --summary"
)]
struct Args {
    // Transfer options
    /// Comma-separated list of `source:destination` pairs
    #[arg(long, value_name = "PAIRS", help_heading = "Transfer options")]
    pairs: String,

    /// Bandwidth limit of every transfer in KB/s
    ///
    /// Must be at least 1, a value of 0 is rejected rather than replaced with the default.
    #[arg(
        long,
        default_value = "1",
        value_name = "KB",
        help_heading = "Transfer options"
    )]
    bandwidth: u64,

    /// Maximum number of transfers running at the same time (0 = no limit)
    #[arg(
        long,
        default_value = "10",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    max_concurrent_transfers: usize,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Set the type of progress display
    ///
    /// If specified, --progress flag is implied.
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Set delay between progress updates
    ///
    /// Default is 200ms for interactive mode (`ProgressBar`) and 10s for non-interactive mode (`TextUpdates`). If specified, --progress flag is implied. Accepts human-readable durations like "200ms", "10s", "5min".
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

#[instrument(skip(registry))]
async fn async_main(
    requests: Vec<common::TransferRequest>,
    transfer: common::TransferConfig,
    registry: std::sync::Arc<common::ProgressRegistry>,
) -> anyhow::Result<common::Summary> {
    let settings = common::transfer::Settings {
        max_concurrent_transfers: transfer.max_concurrent_transfers,
        preserve: common::preserve::preserve_all(),
    };
    let summary = common::transfer::run_all(requests, registry, &settings)
        .await
        .map_err(|error| anyhow!("prsync encountered errors: {}", error))?;
    Ok(summary)
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let transfer = common::TransferConfig {
        bandwidth_kb: args.bandwidth,
        max_concurrent_transfers: args.max_concurrent_transfers,
    };
    if let Err(error) = transfer.validate() {
        eprintln!("{error}");
        std::process::exit(1);
    }
    // nothing is copied unless every pair parses
    let requests = match pairs::parse_pairs(&args.pairs, transfer.bandwidth_kb) {
        Ok(requests) => requests,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    let func = |registry| async_main(requests, transfer, registry);
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(
        if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
            Some(common::ProgressSettings {
                progress_type: args.progress_type.unwrap_or_default(),
                progress_delay: args.progress_delay,
            })
        } else {
            None
        },
        output,
        runtime,
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
