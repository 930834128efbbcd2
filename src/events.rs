//! Event emission for the cleaning pipeline.
//!
//! Stages report what they did (columns dropped, rows removed, conversions
//! made) through an [`EventSink`]. The default sink forwards events to
//! `tracing`; embedders provide their own sink when they need to surface
//! events in a UI.
//!
//! # Example
//!
//! ```rust,ignore
//! use prismaflow::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_event(|event| {
//!         println!("[{:?}] {}", event.stage, event.message);
//!     })
//!     .build()?
//!     .run(df);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::config::StageKind;

/// Severity of a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Routine stage activity (column converted, rows dropped)
    Info,
    /// Something was skipped or fell back (unknown column, unparseable value)
    Warn,
}

/// One observation emitted by a running pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The stage that emitted the event, or None for run-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,

    /// Event severity.
    pub level: EventLevel,

    /// Human-readable description of what happened.
    pub message: String,
}

impl PipelineEvent {
    /// Routine stage activity.
    pub fn info(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            level: EventLevel::Info,
            message: message.into(),
        }
    }

    /// Something was skipped or fell back inside a stage.
    pub fn warn(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            level: EventLevel::Warn,
            message: message.into(),
        }
    }

    /// A run-level event not tied to any stage.
    pub fn run_level(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            level,
            message: message.into(),
        }
    }
}

/// Trait for receiving events during a pipeline run.
///
/// Implementations must be `Send + Sync` so the pipeline can run on a
/// background thread while events flow to a UI thread.
pub trait EventSink: Send + Sync {
    /// Called once per event, in emission order.
    ///
    /// May be called frequently (once per column in some stages), so
    /// implementations should be cheap and non-blocking.
    fn emit(&self, event: PipelineEvent);
}

/// Default sink: forwards events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        let stage = event.stage.map(|s| s.display_name()).unwrap_or("pipeline");
        match event.level {
            EventLevel::Info => tracing::info!(stage, "{}", event.message),
            EventLevel::Warn => tracing::warn!(stage, "{}", event.message),
        }
    }
}

/// Wrapper that implements [`EventSink`] using a closure.
pub struct ClosureEventSink<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureEventSink<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    /// Creates a new closure-based event sink.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for ClosureEventSink<F>
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: PipelineEvent) {
        (self.callback)(event);
    }
}

/// Sink that records events in memory. Useful in tests and for building
/// a post-run report.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all recorded events in emission order.
    pub fn take(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

static_assertions::assert_impl_all!(PipelineEvent: Send, Sync);
static_assertions::assert_impl_all!(TracingSink: Send, Sync);
static_assertions::assert_impl_all!(MemorySink: Send, Sync);
