mod cli;
mod config;
mod error;
mod output;
mod summary;

use std::process;

use clap::Parser;
use mimalloc::MiMalloc;
use segfeed_engine::{FeederError, PlaybackSession, SessionEnd, WebSocketConnector, WriterSink};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::Args,
    config::{AppConfig, LoggingConfig},
    error::{AppError, Result, is_broken_pipe_error},
    output::open_output,
    summary::SessionSummary,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);

    let _guard = init_logging(&config.logging, args.verbose, args.quiet)?;

    config.session.validate()?;
    let endpoint = config.endpoint();
    info!(
        stream_id = %config.session.stream_id,
        host = %endpoint.host,
        port = endpoint.port,
        profile = %config.session.profile,
        "Starting segfeed"
    );

    let writer = open_output(&args.output).await?;
    let (mut sink, events) = WriterSink::spawn(writer);
    let writer_task = sink.take_task();

    let session = PlaybackSession::new(config.session, sink, events, WebSocketConnector);
    let token = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            token.cancel();
        }
    });

    let report = session.run().await;

    // The sink is dropped with the session, so the writer flushes and exits.
    if let Some(task) = writer_task {
        match task.await {
            Ok(Ok(bytes)) => info!(bytes, "Output closed"),
            Ok(Err(e)) if is_broken_pipe_error(&e.to_string()) => {}
            Ok(Err(e)) => warn!(error = %e, "Output writer failed"),
            Err(e) => warn!(error = %e, "Output writer task aborted"),
        }
    }

    info!(
        duration_ms = report.duration().as_millis() as u64,
        segments_fed = report.stats.segments_fed,
        bytes_fed = report.stats.bytes_fed,
        segments_discarded = report.stats.segments_discarded,
        "Session finished"
    );

    if args.summary {
        match SessionSummary::from_report(&report).to_json() {
            Ok(line) => eprintln!("{line}"),
            Err(e) => warn!(error = %e, "Failed to encode session summary"),
        }
    }

    let code = match report.end {
        SessionEnd::Stopped | SessionEnd::StreamEnded | SessionEnd::SinkClosed => 0,
        // The reader on the other end of a pipe went away; not an error for us.
        SessionEnd::Failed(FeederError::SinkFailed { reason })
            if is_broken_pipe_error(&reason) =>
        {
            info!("Output pipe closed by reader");
            0
        }
        SessionEnd::Failed(e) => return Err(AppError::Session(e)),
    };
    Ok(code)
}

fn init_logging(
    logging: &LoggingConfig,
    verbose: u8,
    quiet: bool,
) -> Result<Option<WorkerGuard>> {
    let default_level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match &logging.filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| AppError::Logging(format!("invalid filter {directives:?}: {e}")))?,
            None => EnvFilter::new(default_level.as_str()),
        },
    };

    // stdout may carry the stream itself, so console logs go to stderr.
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose > 0);

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(guard)
}
