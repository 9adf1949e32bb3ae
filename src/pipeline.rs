//! Batch distance pipeline.
//!
//! Drives one run: group rows by origin, plan chunks, send one matrix request
//! per chunk (with retry), write distances back, snapshot the table and emit
//! progress. Exactly one request is in flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::batch::{BatchPlan, Chunk};
use crate::config::RunOptions;
use crate::error::Error;
use crate::events::{ProgressState, RunEvent};
use crate::grouping::group_by_origin;
use crate::matrix::{meters_to_km, MatrixRequest, MatrixResponse};
use crate::retry::RetryPolicy;
use crate::table::{format_distance, RowTable};
use crate::traits::{MatrixTransport, Pause, ProgressObserver, ResultSink, SnapshotKind, ThreadPause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(text)
    }
}

/// Status text for failures caused by the service refusing requests.
pub const RATE_LIMITED_STATUS: &str = "Rate limit reached";

/// Shared flag a front end sets to stop a run between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Chunks processed.
    pub steps: usize,
    /// Rows with a distance.
    pub resolved: usize,
    /// Rows the service had no route for.
    pub unresolved: usize,
}

pub struct MatrixPipeline<T, S, O, P = ThreadPause> {
    options: RunOptions,
    retry: RetryPolicy,
    transport: T,
    sink: S,
    observer: O,
    pause: P,
    cancel: CancelToken,
    state: RunState,
}

impl<T, S, O> MatrixPipeline<T, S, O>
where
    T: MatrixTransport,
    S: ResultSink,
    O: ProgressObserver,
{
    pub fn new(options: RunOptions, transport: T, sink: S, observer: O) -> Self {
        Self {
            retry: RetryPolicy::from(&options),
            options,
            transport,
            sink,
            observer,
            pause: ThreadPause,
            cancel: CancelToken::new(),
            state: RunState::Idle,
        }
    }
}

impl<T, S, O, P> MatrixPipeline<T, S, O, P> {
    /// Replace how the pipeline waits (backoff and inter-request delay).
    pub fn with_pause<Q: Pause>(self, pause: Q) -> MatrixPipeline<T, S, O, Q> {
        MatrixPipeline {
            options: self.options,
            retry: self.retry,
            transport: self.transport,
            sink: self.sink,
            observer: self.observer,
            pause,
            cancel: self.cancel,
            state: self.state,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<T, S, O, P> MatrixPipeline<T, S, O, P>
where
    T: MatrixTransport,
    S: ResultSink,
    O: ProgressObserver,
    P: Pause,
{
    /// Resolve every row of `table`. A pipeline runs once.
    ///
    /// On failure the error is also reported through the observer, and the
    /// last snapshot written before it stays in the sink.
    pub fn run(&mut self, table: &mut RowTable) -> Result<RunReport, Error> {
        if self.state != RunState::Idle {
            return Err(Error::AlreadyStarted);
        }

        self.state = RunState::Running;
        self.emit(RunEvent::Status(RunState::Running.to_string()));
        info!(rows = table.len(), chunk_size = self.options.chunk_size, "starting batch run");

        let result = self.options.validate().and_then(|()| self.process(table));

        match result {
            Ok(report) => {
                self.state = RunState::Completed;
                info!(?report, "batch run completed");
                self.emit(RunEvent::Log(format!("Finished! Saved as {}", self.sink.describe())));
                self.emit(RunEvent::Status(RunState::Completed.to_string()));
            }
            Err(Error::Cancelled) => {
                self.state = RunState::Cancelled;
                info!("batch run cancelled");
                self.emit(RunEvent::Log("Run cancelled".to_string()));
                self.emit(RunEvent::Status(RunState::Cancelled.to_string()));
            }
            Err(ref err) => {
                self.state = RunState::Failed;
                error!(error = %err, "batch run failed");
                self.emit(RunEvent::Log(format!("Error: {err}")));
                let status = if err.is_rate_limited() {
                    RATE_LIMITED_STATUS.to_string()
                } else {
                    RunState::Failed.to_string()
                };
                self.emit(RunEvent::Status(status));
            }
        }

        self.emit(RunEvent::Done);
        result
    }

    fn process(&mut self, table: &mut RowTable) -> Result<RunReport, Error> {
        let groups = group_by_origin(table)?;
        let plan = BatchPlan::new(&groups, self.options.chunk_size);
        let mut progress = ProgressState::new(plan.total_steps());
        info!(origins = groups.len(), total_steps = progress.total_steps, "batch plan ready");

        for chunk in plan.chunks() {
            if progress.current_step > 0 {
                self.pause.pause(self.options.inter_request_delay);
            }
            self.check_cancelled()?;

            let distances = self.fetch_chunk(&chunk)?;
            self.apply_chunk(table, &chunk, &distances);

            progress.advance();
            self.emit(RunEvent::Progress(progress));
            self.emit(RunEvent::Log(format!(
                "Processing {} ({})",
                chunk.origin.name, progress
            )));

            self.sink.persist(table, SnapshotKind::Partial)?;
            self.emit(RunEvent::Log(format!(
                "Partial results saved to {}",
                self.sink.describe()
            )));
        }

        self.sink.persist(table, SnapshotKind::Final)?;

        let resolved = table.resolved_count();
        Ok(RunReport {
            steps: progress.current_step,
            resolved,
            unresolved: table.len() - resolved,
        })
    }

    /// Request one chunk and return distances in metres, aligned with the
    /// chunk's destinations.
    fn fetch_chunk(&self, chunk: &Chunk<'_>) -> Result<Vec<Option<f64>>, Error> {
        let mode = self.options.index_mode;
        let request = MatrixRequest::new(chunk.origin.coord, chunk.destinations, mode);
        debug!(
            origin = %chunk.origin.name,
            chunk = chunk.index,
            destinations = chunk.len(),
            "sending matrix request"
        );

        self.retry.run(&self.pause, |_attempt| {
            let body = self.transport.send(&request)?;
            MatrixResponse::from_json(body)?.distances_for(chunk.len(), mode)
        })
    }

    fn apply_chunk(&self, table: &mut RowTable, chunk: &Chunk<'_>, distances: &[Option<f64>]) {
        for (&row_id, distance) in chunk.row_ids.iter().zip(distances) {
            let distance_km = distance.map(meters_to_km);
            table.set_distance(row_id, distance_km);

            let label = table.get(row_id).map(|row| row.label.as_str()).unwrap_or_default();
            let shown = if distance_km.is_some() {
                format_distance(distance_km)
            } else {
                "n/a".to_string()
            };
            self.emit(RunEvent::Log(format!(
                "{} - {} - {} km",
                chunk.origin.name, label, shown
            )));
        }
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn emit(&self, event: RunEvent) {
        self.observer.on_event(event);
    }
}
