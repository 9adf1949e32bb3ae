//! Seams between the batching core and its collaborators.
//!
//! The core never talks to HTTP, files or a UI directly. Front ends supply
//! implementations of these traits.

use std::time::Duration;

use crate::error::Error;
use crate::events::RunEvent;
use crate::matrix::MatrixRequest;
use crate::table::RowTable;

/// Sends one matrix request and returns the decoded JSON body.
///
/// Implementations report network, timeout and non-2xx failures as
/// [`Error::Transport`] and undecodable bodies as [`Error::MalformedResponse`].
pub trait MatrixTransport {
    fn send(&self, request: &MatrixRequest) -> Result<serde_json::Value, Error>;
}

/// Whether a persisted snapshot is mid-run or final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Partial,
    Final,
}

/// Durable store for result snapshots.
///
/// Every call receives the full table, including rows not yet resolved.
pub trait ResultSink {
    fn persist(&mut self, table: &RowTable, kind: SnapshotKind) -> Result<(), Error>;

    /// Human-readable location used in log events.
    fn describe(&self) -> String {
        "result sink".to_string()
    }
}

/// Receives run events. Must not block the worker.
pub trait ProgressObserver {
    fn on_event(&self, event: RunEvent);
}

/// Waits between attempts and between requests.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<T: MatrixTransport + ?Sized> MatrixTransport for &T {
    fn send(&self, request: &MatrixRequest) -> Result<serde_json::Value, Error> {
        (**self).send(request)
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn persist(&mut self, table: &RowTable, kind: SnapshotKind) -> Result<(), Error> {
        (**self).persist(table, kind)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<O: ProgressObserver + ?Sized> ProgressObserver for &O {
    fn on_event(&self, event: RunEvent) {
        (**self).on_event(event)
    }
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}
