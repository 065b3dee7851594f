//! erpipe loader binary.
//!
//! Feeds a JSON-lines record file through the resolution engine, drains the
//! redo backlog, and writes one resolved entity document per affected entity
//! to the output file.
//!
//! This binary wires the embedded [`MemoryEngine`] backend; deployments with
//! a real resolution engine implement [`erpipe::EngineGateway`] over their
//! engine's SDK and reuse the library pipeline unchanged.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use erpipe::pipeline::DEFAULT_WINDOW_WIDTH;
use erpipe::{CheckpointStore, MemoryEngine, Pipeline, PipelineConfig, PipelineResult};

#[derive(Debug, Parser)]
#[command(
    name = "erpipe",
    version,
    about = "Windowed incremental loader for an external entity-resolution engine"
)]
struct Args {
    /// JSON-lines record file to process
    file_to_process: PathBuf,

    /// Name of output file to use
    #[arg(short = 'o', long = "out-file", default_value = "load_delta.json")]
    out_file: PathBuf,

    /// Name of temporary with-info checkpoint file to use
    #[arg(short = 'i', long = "info-file", default_value = "/tmp/withInfo.json")]
    info_file: PathBuf,

    /// Maximum number of engine calls in flight at once
    #[arg(short = 'w', long = "window", default_value_t = DEFAULT_WINDOW_WIDTH)]
    window: usize,

    /// Output debug trace information
    #[arg(short = 't', long = "debug-trace")]
    debug_trace: bool,
}

fn run(args: &Args) -> PipelineResult<()> {
    let input = BufReader::new(File::open(&args.file_to_process)?);

    // The checkpoint guard runs before the output file is touched, so a
    // refused start never clobbers the output of the run that left the
    // checkpoint behind.
    let checkpoint = CheckpointStore::create(&args.info_file)?;
    let mut out = File::create(&args.out_file)?;

    let engine = MemoryEngine::new();
    let config = PipelineConfig {
        window_width: args.window,
        ..PipelineConfig::default()
    };

    let report = Pipeline::new(&engine, config).run(input, checkpoint, &mut out)?;
    info!(
        "run complete: {} adds, {} redo records, {} entities materialized to {}",
        report.adds,
        report.redos,
        report.entities,
        args.out_file.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug_trace { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("shutting down due to error: {err}");
            ExitCode::FAILURE
        }
    }
}
