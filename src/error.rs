use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the simulator.
///
/// The engine has exactly one domain failure: a run id that was never
/// started. Most operations treat that as a silent no-op; the ones that
/// must report it return this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

pub type SimResult<T> = Result<T, SimError>;
