use crate::models::{ActionCommand, AlarmEvent, TelemetryEvent, TestResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tracing::trace;

/// Any record the store accepts. Lets [`EventStore::append`] take each kind
/// through one entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum Event {
    Telemetry(TelemetryEvent),
    Alarm(AlarmEvent),
    TestResult(TestResult),
    Action(ActionCommand),
}

impl From<TelemetryEvent> for Event {
    fn from(event: TelemetryEvent) -> Self {
        Event::Telemetry(event)
    }
}

impl From<AlarmEvent> for Event {
    fn from(event: AlarmEvent) -> Self {
        Event::Alarm(event)
    }
}

impl From<TestResult> for Event {
    fn from(event: TestResult) -> Self {
        Event::TestResult(event)
    }
}

impl From<ActionCommand> for Event {
    fn from(event: ActionCommand) -> Self {
        Event::Action(event)
    }
}

/// Per-stream record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub telemetry: usize,
    pub alarms: usize,
    pub test_results: usize,
    pub actions: usize,
}

/// Append-only, process-lifetime record of the four event streams.
///
/// Each stream has its own lock, so a telemetry append never waits on an
/// alarm query. Entries are never removed or modified; reads return clones
/// in append order. Run ids are not checked against the engine.
#[derive(Debug, Default)]
pub struct EventStore {
    telemetry: RwLock<Vec<TelemetryEvent>>,
    alarms: RwLock<Vec<AlarmEvent>>,
    test_results: RwLock<Vec<TestResult>>,
    actions: RwLock<Vec<ActionCommand>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: impl Into<Event>) {
        match event.into() {
            Event::Telemetry(e) => push(&self.telemetry, e),
            Event::Alarm(e) => push(&self.alarms, e),
            Event::TestResult(e) => push(&self.test_results, e),
            Event::Action(e) => push(&self.actions, e),
        }
    }

    /// Telemetry for `run_id` with `start <= timestamp <= end`.
    pub fn query_telemetry(
        &self,
        run_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<TelemetryEvent> {
        select(&self.telemetry, |e| {
            e.run_id == run_id && start <= e.timestamp && e.timestamp <= end
        })
    }

    /// Alarms for `run_id` with `start <= timestamp <= end`.
    pub fn query_alarms(
        &self,
        run_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<AlarmEvent> {
        select(&self.alarms, |e| {
            e.run_id == run_id && start <= e.timestamp && e.timestamp <= end
        })
    }

    pub fn query_test_results(&self, run_id: &str) -> Vec<TestResult> {
        select(&self.test_results, |e| e.run_id == run_id)
    }

    pub fn get_actions(&self, run_id: &str) -> Vec<ActionCommand> {
        select(&self.actions, |e| e.run_id == run_id)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            telemetry: len(&self.telemetry),
            alarms: len(&self.alarms),
            test_results: len(&self.test_results),
            actions: len(&self.actions),
        }
    }
}

fn push<T>(stream: &RwLock<Vec<T>>, event: T) {
    let mut guard = stream.write().unwrap_or_else(PoisonError::into_inner);
    guard.push(event);
    trace!(len = guard.len(), "event appended");
}

fn select<T: Clone>(stream: &RwLock<Vec<T>>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    stream
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|e| keep(e))
        .cloned()
        .collect()
}

fn len<T>(stream: &RwLock<Vec<T>>) -> usize {
    stream.read().unwrap_or_else(PoisonError::into_inner).len()
}
