//! Fill a simulated volume backed by an image file and validate it.
//!
//! ```text
//! fillcheck volume.img --create-sectors 65536 --chaos --seed 7
//! ```

use clap::Parser;
use fillcheck::config::{DEFAULT_ENTRIES_PER_FILE, DEFAULT_MAX_FILES, DEFAULT_READ_CHUNK};
use fillcheck::{
    ConfigError, DriverConfig, RunError, RunReport, VolumeFillTest, run_to_completion,
};
use fillcheck_core::EngineError;
use fillcheck_sim::{ImageBlockStore, SimFilesystem, SimFsConfiguration};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "fillcheck")]
#[command(about = "Fill a volume with log files and verify every byte reads back", long_about = None)]
struct Args {
    /// Block device image backing the volume
    image: PathBuf,

    /// Create (or resize) the image to this many 512-byte sectors first
    #[arg(long, value_name = "SECTORS")]
    create_sectors: Option<u64>,

    /// Seed for the simulated engine
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Entries written to each log file
    #[arg(long, default_value_t = DEFAULT_ENTRIES_PER_FILE)]
    entries_per_file: u64,

    /// Upper bound on the number of log files
    #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
    max_files: u32,

    /// Bytes requested per read while validating
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK)]
    read_chunk: usize,

    /// Randomize engine latencies and partial writes from the seed
    #[arg(long)]
    chaos: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

/// Failures that end the command before or during a run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// The backing image could not be created or opened.
    #[error("{}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// The engine rejected the volume or its configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The driver configuration is out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run itself failed.
    #[error(transparent)]
    Run(#[from] RunError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(&args) {
        Ok(report) => {
            eprintln!("{report}");
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("[Fail]     Encoding report failed: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let CliError::Run(RunError::Fatal { stage, counters }) = &err {
                tracing::error!(
                    "Engine failed in stage {} after {} files ({} bytes)",
                    stage,
                    counters.write_file_index,
                    counters.bytes_written_total + counters.bytes_written_this_file
                );
            }
            eprintln!("[Fail]     {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunReport, CliError> {
    let store = match args.create_sectors {
        Some(sectors) => ImageBlockStore::create(&args.image, sectors),
        None => ImageBlockStore::open(&args.image),
    }
    .map_err(|source| CliError::Image {
        path: args.image.clone(),
        source,
    })?;

    let engine_config = if args.chaos {
        SimFsConfiguration::random_for_seed(args.seed)
    } else {
        SimFsConfiguration::default().with_seed(args.seed)
    };
    tracing::debug!("Engine configuration: {:?}", engine_config);
    let mut fs = SimFilesystem::new(store, engine_config)?;

    let config = DriverConfig::new()
        .entries_per_file(args.entries_per_file)
        .max_files(args.max_files)
        .read_chunk(args.read_chunk);
    let mut test = VolumeFillTest::new(config)?;

    Ok(run_to_completion(&mut fs, &mut test)?)
}
