//! Process entry point: owns the index, the corpus provider, both worker
//! pools, the refresh scheduler, and the connection acceptor, and wires
//! them together. Everything downstream borrows from here; there is no
//! other owner of these subsystems.

#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use engine::{CorpusProvider, FsCorpusProvider, InvertedIndex, RefreshScheduler, WorkerPool};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use search_server::Acceptor;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "search-server",
    about = "A network-accessible full-text search server over a curated corpus of plain-text files."
)]
struct Settings {
    /// The log level filter; any logs above this level won't be displayed.
    #[structopt(long, default_value = "info", env)]
    log_level: LevelFilter,

    /// Use ANSI colours for log levels. Disable if logging to a file.
    #[structopt(long, env)]
    pretty_logs: Option<bool>,

    /// An optional file to send persistent logs to, in addition to stdout.
    #[structopt(long, env)]
    log_file: Option<String>,

    /// The TCP port to bind the server to.
    #[structopt(long, short, default_value = "8080", env)]
    port: u16,

    /// One or more root directories to recursively search for `.txt` files.
    #[structopt(long = "corpus-root", short = "c", required = true)]
    corpus_roots: Vec<PathBuf>,

    /// Number of worker threads used to build the index. Defaults to the
    /// number of logical cores if not set.
    #[structopt(long, env)]
    ingest_threads: Option<usize>,

    /// Number of worker threads used to serve connected clients. Defaults
    /// to the number of logical cores if not set.
    #[structopt(long, env)]
    client_threads: Option<usize>,

    /// Maximum number of clients served concurrently; overflow connections
    /// are parked in the waiting queue.
    #[structopt(long, default_value = "4", env)]
    max_active_clients: usize,

    /// How often, in seconds, the background scheduler re-scans the
    /// corpus and ingests newly discovered documents.
    #[structopt(long, default_value = "60", env)]
    refresh_interval_seconds: u64,
}

fn main() {
    let settings = match setup() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error during server setup: {:?}", e);
            std::process::exit(1);
        },
    };

    if let Err(e) = run(settings) {
        error!("fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn setup() -> Result<Settings> {
    let settings = Settings::from_args();
    setup_logger(
        settings.log_level,
        &settings.log_file,
        settings.pretty_logs.unwrap_or(true),
    )?;
    Ok(settings)
}

fn setup_logger(level: LevelFilter, log_file: &Option<String>, pretty: bool) -> Result<()> {
    let mut colours = ColoredLevelConfig::new();
    if pretty {
        colours = colours
            .info(Color::Green)
            .warn(Color::Yellow)
            .error(Color::BrightRed)
            .debug(Color::Magenta)
            .trace(Color::Cyan);
    }

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} | {} | {:<5} - {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                colours.color(record.level()),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(file) = log_file {
        dispatch = dispatch.chain(fern::log_file(file)?);
    }

    dispatch.apply()?;
    Ok(())
}

fn run(settings: Settings) -> Result<()> {
    for root in &settings.corpus_roots {
        if !root.is_dir() {
            warn!("corpus root {} does not exist or is not a directory", root.display());
        }
    }

    let ingest_threads = settings.ingest_threads.unwrap_or_else(num_cpus::get);
    let client_threads = settings.client_threads.unwrap_or_else(num_cpus::get);

    let corpus: Arc<dyn CorpusProvider> =
        Arc::new(FsCorpusProvider::new(settings.corpus_roots.clone()));
    let index = Arc::new(InvertedIndex::new(corpus.clone()));
    let ingest_pool = Arc::new(WorkerPool::new("ingest", ingest_threads));
    let client_pool = Arc::new(WorkerPool::new("client", client_threads));

    info!(
        "ingest pool started with {} threads, client pool started with {} threads",
        ingest_threads, client_threads
    );

    info!("building inverted index from corpus roots: {:?}", settings.corpus_roots);
    let indexing_start = Instant::now();
    index.build(&ingest_pool);
    info!(
        "index built: {} documents, {} distinct tokens, took {:?}",
        index.indexed_count(),
        index.vocabulary_size(),
        indexing_start.elapsed()
    );

    let mut scheduler = RefreshScheduler::start(
        index.clone(),
        ingest_pool.clone(),
        settings.refresh_interval_seconds,
    );

    let acceptor = Arc::new(
        Acceptor::bind(
            settings.port,
            settings.max_active_clients,
            client_pool.clone(),
            index.clone(),
            corpus.clone(),
        )
        .context("failed to bind listening socket")?,
    );

    info!("listening on port {}", settings.port);

    let shutdown_acceptor = acceptor.clone();
    ctrlc::set_handler(move || {
        info!("shutdown requested, stopping...");
        shutdown_acceptor.shutdown();
    })
    .context("failed to install Ctrl-C handler")?;

    acceptor.run();

    info!("acceptor stopped, shutting down background services");
    scheduler.stop();

    // The ingest pool drains before the client pool so no in-flight
    // session can enqueue new ingest work after shutdown has begun.
    ingest_pool.terminate();
    client_pool.terminate();

    Ok(())
}
