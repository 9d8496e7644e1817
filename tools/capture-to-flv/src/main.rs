//! Rebuilds a playable FLV file from a `tcpdump -x` transcript of the
//! server-to-client half of an RTMP session.

mod transcript;

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flowcap::{FlowIngest, GapPolicy};
use log::{info, LevelFilter};
use rtmp2flv::{FlvSession, SessionConfig, SessionSummary};

/// Rebuilds an FLV file from a captured one-directional RTMP stream.
#[derive(Parser, Debug)]
#[command(name = "capture-to-flv", version, about)]
struct Cli {
    /// tcpdump -x transcript of the server-to-client RTMP traffic
    input: PathBuf,

    /// FLV file to write
    output: PathBuf,

    /// Tolerate TCP sequence gaps instead of failing
    #[arg(long)]
    ignore_missing: bool,

    /// Fill tolerated gaps with zero bytes and salvage chunk headers lost
    /// to them (implies --ignore-missing)
    #[arg(long)]
    insert_zeros: bool,

    /// RTMP chunk size in effect before any chunk-size message
    #[arg(long, default_value_t = 128)]
    default_chunk_size: usize,

    /// Largest accepted message routing id
    #[arg(long, default_value_t = 16)]
    max_routing_id: u32,

    /// TCP source port carrying the stream
    #[arg(long, default_value_t = 1935)]
    rtmp_port: u16,

    /// Verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(&args) {
        Ok(summary) => {
            print_summary(&args, &summary);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {}", error);
            let mut source = error.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<SessionSummary, Box<dyn Error>> {
    let policy = match (args.ignore_missing || args.insert_zeros, args.insert_zeros) {
        (false, _) => GapPolicy::Strict,
        (true, false) => GapPolicy::Skip,
        (true, true) => GapPolicy::ZeroFill,
    };

    let segments = transcript::read_segments(&args.input, args.rtmp_port)?;
    if segments.is_empty() {
        return Err(format!("no RTMP segments found in {}", args.input.display()).into());
    }
    info!(
        "{} segments read from {}",
        segments.len(),
        args.input.display()
    );

    let mut ingest = FlowIngest::new(policy);
    for segment in &segments {
        ingest.accept(segment)?;
    }
    let stream = ingest.finish()?;
    info!("reassembled {} bytes", stream.total_len());

    let config = SessionConfig {
        default_chunk_size: args.default_chunk_size,
        max_routing_id: args.max_routing_id,
        zero_fill_recovery: policy == GapPolicy::ZeroFill,
    };

    let sink = BufWriter::new(File::create(&args.output)?);
    let session = FlvSession::new(stream, sink, config);
    match session.run() {
        Ok(summary) => Ok(summary),
        Err(error) => {
            // Never leave a partially written file behind.
            let _ = fs::remove_file(&args.output);
            Err(error.into())
        }
    }
}

fn print_summary(args: &Cli, summary: &SessionSummary) {
    println!("wrote {}", args.output.display());
    if let Some(name) = &summary.stream_name {
        println!("  stream:      {}", name);
    }
    println!("  script tags: {}", summary.script_tags);
    println!("  audio tags:  {}", summary.audio_tags);
    println!("  video tags:  {}", summary.video_tags);
    if summary.raw_bytes > 0 {
        println!("  raw bytes:   {}", summary.raw_bytes);
    }
    println!("  duration:    {:.2}s", summary.last_timestamp as f64 / 1000.0);
    println!("  file size:   {} bytes", summary.bytes_written);
}
