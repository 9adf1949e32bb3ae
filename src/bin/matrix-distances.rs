//! matrix-distances — resolve road distances for an origin/destination table.
//!
//! Reads a CSV table, batches destinations per origin into matrix requests
//! and rewrites the output file after every chunk. The batch runs on a worker
//! thread; this thread renders its events as log lines.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{error, info};

use matrix_batch::config::{
    Credentials, RunOptions, DEFAULT_BACKOFF_BASE, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES,
};
use matrix_batch::events::{RunEvent, TracingObserver};
use matrix_batch::matrix::IndexMode;
use matrix_batch::ors::OrsMatrixClient;
use matrix_batch::pipeline::MatrixPipeline;
use matrix_batch::sink::CsvSink;
use matrix_batch::table::{RowTable, TableSchema};
use matrix_batch::traits::ProgressObserver;

// ── CLI ─────────────────────────────────────────────────────────────

/// Batch road distances through a distance-matrix service.
#[derive(Parser, Debug)]
#[command(name = "matrix-distances", version, about)]
struct Cli {
    /// Input table (CSV).
    #[arg(long, env = "MATRIX_INPUT", default_value = "routes.csv")]
    input: PathBuf,

    /// Output table, rewritten after every chunk.
    #[arg(long, env = "MATRIX_OUTPUT", default_value = "routes_with_distance.csv")]
    output: PathBuf,

    /// Credentials JSON file with `api_key` and `url`. Falls back to
    /// MATRIX_API_KEY / MATRIX_URL when absent.
    #[arg(long, env = "MATRIX_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Destinations per request.
    #[arg(long, env = "MATRIX_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Attempts per request.
    #[arg(long, env = "MATRIX_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Backoff base; failed attempt n waits base^n seconds.
    #[arg(long, env = "MATRIX_BACKOFF_BASE", default_value_t = DEFAULT_BACKOFF_BASE)]
    backoff_base: u32,

    /// Pause between requests in seconds.
    #[arg(long, env = "MATRIX_DELAY_SECS", default_value_t = 2.0)]
    delay_secs: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MATRIX_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Send `sources`/`destinations` indices with each request.
    #[arg(long)]
    explicit_indices: bool,

    /// CSV field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    #[arg(long, default_value = "Origin")]
    origin_column: String,

    #[arg(long, default_value = "Long|Lat")]
    origin_coord_column: String,

    #[arg(long, default_value = "Longitude")]
    longitude_column: String,

    #[arg(long, default_value = "Latitude")]
    latitude_column: String,

    #[arg(long, default_value = "Destino")]
    label_column: String,
}

impl Cli {
    fn delimiter(&self) -> anyhow::Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| anyhow!("delimiter must be a single ASCII character"))
    }

    fn schema(&self) -> anyhow::Result<TableSchema> {
        Ok(TableSchema {
            origin: self.origin_column.clone(),
            origin_coord: self.origin_coord_column.clone(),
            longitude: self.longitude_column.clone(),
            latitude: self.latitude_column.clone(),
            label: self.label_column.clone(),
            delimiter: self.delimiter()?,
        })
    }

    fn run_options(&self) -> anyhow::Result<RunOptions> {
        let inter_request_delay = Duration::try_from_secs_f64(self.delay_secs)
            .context("delay must be a non-negative number of seconds")?;
        let options = RunOptions {
            chunk_size: self.chunk_size,
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            inter_request_delay,
            request_timeout: Duration::from_secs(self.timeout_secs),
            index_mode: if self.explicit_indices {
                IndexMode::Explicit
            } else {
                IndexMode::Implicit
            },
            ..RunOptions::default()
        };
        options.validate()?;
        Ok(options)
    }

    fn credentials(&self) -> anyhow::Result<Credentials> {
        let credentials = match &self.credentials {
            Some(path) => Credentials::from_file(path)
                .with_context(|| format!("loading credentials from {}", path.display()))?,
            None => Credentials::from_env().context("loading credentials from environment")?,
        };
        Ok(credentials)
    }
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let options = cli.run_options()?;
    let schema = cli.schema()?;
    let credentials = cli.credentials()?;
    info!(url = %credentials.url, "loaded credentials");

    let mut table = RowTable::from_csv_path(&cli.input, &schema)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    info!(path = %cli.input.display(), rows = table.len(), "loaded input table");

    let client = OrsMatrixClient::new(credentials, options.request_timeout)?;
    let sink = CsvSink::new(&cli.output).with_delimiter(schema.delimiter);

    let (tx, rx) = mpsc::channel::<RunEvent>();
    let worker = thread::spawn(move || {
        let mut pipeline = MatrixPipeline::new(options, client, sink, tx);
        pipeline.run(&mut table)
    });

    let display = TracingObserver;
    for event in rx {
        display.on_event(event);
    }

    match worker.join() {
        Ok(Ok(report)) => {
            info!(
                resolved = report.resolved,
                unresolved = report.unresolved,
                output = %cli.output.display(),
                "done"
            );
            Ok(())
        }
        Ok(Err(err)) => {
            error!(error = %err, "run failed");
            Err(err.into())
        }
        Err(_) => Err(anyhow!("worker thread panicked")),
    }
}
