//! Run events and the stock observers that consume them.

use std::sync::mpsc::Sender;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::traits::ProgressObserver;

/// Self-contained notification emitted by a running pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Status(String),
    Progress(ProgressState),
    Log(String),
    Done,
}

/// Chunks completed out of chunks planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    pub current_step: usize,
    pub total_steps: usize,
}

impl ProgressState {
    pub fn new(total_steps: usize) -> Self {
        Self {
            current_step: 0,
            total_steps,
        }
    }

    /// Record one finished chunk. Never passes `total_steps`.
    pub fn advance(&mut self) {
        self.current_step = (self.current_step + 1).min(self.total_steps);
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == self.total_steps
    }

    /// Progress bar value in `0.0..=100.0`. An empty run counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total_steps == 0 {
            return 100.0;
        }
        self.current_step as f64 / self.total_steps as f64 * 100.0
    }
}

impl std::fmt::Display for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.current_step, self.total_steps)
    }
}

/// Forward events to another thread, e.g. a UI loop.
///
/// A dropped receiver is not an error: the worker keeps running.
impl ProgressObserver for Sender<RunEvent> {
    fn on_event(&self, event: RunEvent) {
        if self.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// Renders events as log lines for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: RunEvent) {
        match event {
            RunEvent::Status(text) => info!(status = %text, "run status"),
            RunEvent::Progress(progress) => {
                info!(progress = %progress, percent = progress.percent(), "run progress")
            }
            RunEvent::Log(text) => info!("{}", text),
            RunEvent::Done => info!("run finished"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Progress(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RunEvent::Log(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_progress_advances_to_total() {
        let mut progress = ProgressState::new(2);
        assert_eq!(progress.percent(), 0.0);
        progress.advance();
        assert_eq!(progress.to_string(), "1/2");
        assert_eq!(progress.percent(), 50.0);
        progress.advance();
        progress.advance();
        assert!(progress.is_complete());
        assert_eq!(progress.current_step, 2);
    }

    #[test]
    fn test_empty_progress_is_complete() {
        let progress = ProgressState::new(0);
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100.0);
    }

    #[test]
    fn test_channel_observer_delivers_in_order() {
        let (tx, rx) = mpsc::channel::<RunEvent>();
        tx.on_event(RunEvent::Status("Running".to_string()));
        tx.on_event(RunEvent::Done);
        drop(tx);

        let received: Vec<RunEvent> = rx.iter().collect();
        assert_eq!(
            received,
            vec![RunEvent::Status("Running".to_string()), RunEvent::Done]
        );
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel::<RunEvent>();
        drop(rx);
        tx.on_event(RunEvent::Log("nobody listening".to_string()));
    }

    #[test]
    fn test_recording_observer_filters() {
        let observer = RecordingObserver::new();
        observer.on_event(RunEvent::Status("Running".to_string()));
        observer.on_event(RunEvent::Progress(ProgressState {
            current_step: 1,
            total_steps: 1,
        }));
        observer.on_event(RunEvent::Log("line".to_string()));

        assert_eq!(observer.statuses(), vec!["Running".to_string()]);
        assert_eq!(observer.progress().len(), 1);
        assert_eq!(observer.logs(), vec!["line".to_string()]);
        assert_eq!(observer.events().len(), 3);
    }
}
