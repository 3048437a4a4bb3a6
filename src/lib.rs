//! # ATE Digital Twin
//!
//! A digital-twin simulator for automated test equipment. Synthetic fault
//! scenarios are injected into a virtual test cell; the engine synthesizes
//! telemetry and alarms reflecting those faults, accepts corrective actions,
//! and an event store records everything for later analysis.
//!
//! ## Features
//!
//! - **Fault scenarios**: temperature drift, power-supply failure, intermittent noise
//! - **Telemetry synthesis**: seeded measured values and yield under fault
//! - **Alarms**: at most one per poll, suppressed once a run is remediated
//! - **Corrective actions**: cooldown, recalibration, supply reset, reseat
//! - **Event store**: append-only streams queried by run and time window
//! - **Retest analysis**: before/after deltas for remediated runs
//!
//! ## Quick Start
//!
//! ```rust
//! use atetwin::{ActionCommand, ActionType, EventStore, ScenarioId, SimEngine};
//!
//! let engine = SimEngine::new();
//! let store = EventStore::new();
//!
//! let run_id = engine.start_run(ScenarioId::TempDrift, 1, 1.0);
//! engine.inject_fault(&run_id);
//!
//! let telemetry = engine.generate_telemetry(&run_id).unwrap();
//! assert_eq!(telemetry.temperature, 40.0);
//! store.append(telemetry);
//!
//! if let Some(alarm) = engine.generate_alarm(&run_id) {
//!     store.append(alarm);
//! }
//!
//! let action = ActionCommand::new(&run_id, ActionType::Cooldown, "over temperature");
//! engine.apply_action(&run_id, &action);
//! store.append(action);
//! assert!(engine.generate_alarm(&run_id).is_none());
//! ```
//!
//! ## Architecture
//!
//! - [`models`] - Immutable event records
//! - [`scenario`] - Per-run state and the scenario rule tables
//! - [`engine`] - Run lifecycle and telemetry/alarm synthesis
//! - [`store`] - Append-only event streams
//! - [`retest`] - Retest comparison over recorded events

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod engine;
pub mod error;
pub mod models;
pub mod retest;
pub mod scenario;
pub mod store;

// Re-export main public types for convenience
pub use engine::{EngineConfig, SeedMode, SimEngine};
pub use error::{SimError, SimResult};
pub use models::{
    ActionCommand, ActionType, AlarmCode, AlarmEvent, AlarmSeverity, RetestReport, TelemetryEvent,
    TestResult, TimeWindow,
};
pub use retest::RetestAnalyzer;
pub use scenario::{ScenarioId, ScenarioState};
pub use store::{Event, EventStore};
