/*!
 * Progress reporting.
 *
 * The orchestrator is the single writer. Front-ends subscribe through a `ProgressSink`
 * implementation: a broadcast channel for interactive consumers, or the log for headless
 * runs. Percentages only move forward; a smaller value is clamped to the current one.
 */

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::dubbing::pipeline::PipelineState;

/// Severity attached to a progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for ProgressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressLevel::Info => write!(f, "INFO"),
            ProgressLevel::Warn => write!(f, "WARN"),
            ProgressLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One update published by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Coarse completion percentage, never decreasing within a run
    pub percent: u8,
    /// Pipeline state at the time of the event
    pub state: PipelineState,
    pub level: ProgressLevel,
    pub message: String,
    /// Set on the single success or failure event that ends a run
    pub terminal: bool,
}

/// Destination for progress events
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Fan-out sink backed by a tokio broadcast channel
///
/// Slow subscribers may miss intermediate events (they observe a lag), but every
/// received event is complete.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ProgressSink for BroadcastProgress {
    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

/// Sink that writes every event through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn publish(&self, event: ProgressEvent) {
        match event.level {
            ProgressLevel::Info => info!("[{:>3}%] {}", event.percent, event.message),
            ProgressLevel::Warn => warn!("[{:>3}%] {}", event.percent, event.message),
            ProgressLevel::Error => error!("[{:>3}%] {}", event.percent, event.message),
        }
    }
}

/// Writer-side helper owned by the orchestrator
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    percent: AtomicU8,
    finished: AtomicBool,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            percent: AtomicU8::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Current percentage
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Whether the terminal event has been sent
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Move the percentage forward and publish a status message
    pub fn advance(&self, percent: u8, state: PipelineState, message: impl Into<String>) {
        let percent = self.raise(percent);
        self.emit(percent, state, ProgressLevel::Info, message.into(), false);
    }

    /// Publish a message at the current percentage
    pub fn note(&self, state: PipelineState, level: ProgressLevel, message: impl Into<String>) {
        self.emit(self.percent(), state, level, message.into(), false);
    }

    /// Publish the terminal event; later calls are ignored
    pub fn finish(&self, state: PipelineState, level: ProgressLevel, message: impl Into<String>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            debug!("Ignoring second terminal progress event");
            return;
        }
        let percent = if state == PipelineState::Done {
            self.raise(100)
        } else {
            self.percent()
        };
        self.emit(percent, state, level, message.into(), true);
    }

    fn raise(&self, percent: u8) -> u8 {
        let percent = percent.min(100);
        let previous = self.percent.fetch_max(percent, Ordering::SeqCst);
        previous.max(percent)
    }

    fn emit(&self, percent: u8, state: PipelineState, level: ProgressLevel, message: String, terminal: bool) {
        self.sink.publish(ProgressEvent {
            percent,
            state,
            level,
            message,
            terminal,
        });
    }
}
