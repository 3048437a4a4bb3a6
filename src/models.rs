use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EQUIPMENT_ID: &str = "ATE-001";

/// Closed time interval `[start, end]` used for store queries and retest windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

/// Snapshot of a run's physical state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub equipment_id: String,
    pub temperature: f64,
    pub calibration_offset: f64,
    pub power_supply_voltage: f64,
    pub noise_sigma: f64,
    pub measured_value: f64,
    pub yield_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmCode {
    TempHigh,
    PsuFault,
    NoiseHigh,
}

impl AlarmCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmCode::TempHigh => "TEMP_HIGH",
            AlarmCode::PsuFault => "PSU_FAULT",
            AlarmCode::NoiseHigh => "NOISE_HIGH",
        }
    }
}

impl fmt::Display for AlarmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmSeverity {
    Warning,
    Critical,
}

impl AlarmSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmSeverity::Warning => "WARNING",
            AlarmSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub code: AlarmCode,
    pub severity: AlarmSeverity,
    pub message: String,
}

/// Parametric test outcome. Produced outside the engine (see
/// [`TestResult::evaluate`]) and recorded in the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub param_name: String,
    pub measured: f64,
    pub spec_min: f64,
    pub spec_max: f64,
    pub pass_fail: bool,
}

impl TestResult {
    /// Builds a result whose pass flag is `spec_min <= measured <= spec_max`.
    pub fn evaluate(
        timestamp: DateTime<Utc>,
        run_id: &str,
        param_name: &str,
        measured: f64,
        spec_min: f64,
        spec_max: f64,
    ) -> Self {
        Self {
            timestamp,
            run_id: run_id.to_owned(),
            param_name: param_name.to_owned(),
            measured,
            spec_min,
            spec_max,
            pass_fail: spec_min <= measured && measured <= spec_max,
        }
    }
}

/// Operator remediation. Anything outside the known set is kept verbatim in
/// `Other` so it can still be recorded and applied (with no physical effect).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Cooldown,
    Recalibrate,
    ResetSupply,
    ReinitSequence,
    ReseatConnection,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Cooldown => "COOLDOWN",
            ActionType::Recalibrate => "RECALIBRATE",
            ActionType::ResetSupply => "RESET_SUPPLY",
            ActionType::ReinitSequence => "REINIT_SEQUENCE",
            ActionType::ReseatConnection => "RESEAT_CONNECTION",
            ActionType::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ActionType::Other(_))
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "COOLDOWN" => ActionType::Cooldown,
            "RECALIBRATE" => ActionType::Recalibrate,
            "RESET_SUPPLY" => ActionType::ResetSupply,
            "REINIT_SEQUENCE" => ActionType::ReinitSequence,
            "RESEAT_CONNECTION" => ActionType::ReseatConnection,
            _ => ActionType::Other(value),
        }
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        ActionType::from(value.to_owned())
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        match value {
            ActionType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for ActionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionType::from(s))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub run_id: String,
    pub action_type: ActionType,
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub reason: String,
}

impl ActionCommand {
    pub fn new(run_id: &str, action_type: impl Into<ActionType>, reason: &str) -> Self {
        Self {
            run_id: run_id.to_owned(),
            action_type: action_type.into(),
            parameters: BTreeMap::new(),
            reason: reason.to_owned(),
        }
    }

    /// Adds or replaces a named parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.to_owned(), value.into());
        self
    }
}

/// Comparison of a run's behaviour before and after remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetestReport {
    pub run_id: String,
    pub baseline: TimeWindow,
    pub retest: TimeWindow,
    pub deltas: BTreeMap<String, f64>,
    pub resolved: bool,
    pub summary: String,
}
