use crate::models::{ActionType, AlarmCode, AlarmSeverity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Nominal test-cell conditions
pub const NOMINAL_TEMPERATURE_C: f64 = 25.0;
pub const NOMINAL_CALIBRATION_OFFSET: f64 = 0.0;
pub const NOMINAL_SUPPLY_VOLTAGE_V: f64 = 3.3;
pub const NOMINAL_NOISE_SIGMA: f64 = 0.01;
pub const NOMINAL_BASE_YIELD_PERCENT: f64 = 95.0;

// Fault magnitudes at severity 1.0
const TEMP_DRIFT_SPAN_C: f64 = 15.0;
const TEMP_DRIFT_CAL_SPAN: f64 = 0.05;
const NOISE_SIGMA_SPAN: f64 = 0.15;
const SUPPLY_FAULT_VOLTAGE_V: f64 = 0.0;

// Yield loss coefficients
const TEMP_YIELD_LOSS_PER_C: f64 = 2.0;
const SUPPLY_FAULT_YIELD_LOSS: f64 = 90.0;
const NOISE_YIELD_LOSS_PER_SIGMA: f64 = 100.0;

// Alarm thresholds
pub const TEMP_ALARM_THRESHOLD_C: f64 = 35.0;
pub const NOISE_ALARM_THRESHOLD: f64 = 0.1;

const NOMINAL_MEASURED_VALUE: f64 = 1.0;

/// Supported fault families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioId {
    TempDrift,
    SupplyFault,
    NoiseIntermittent,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 3] = [
        ScenarioId::TempDrift,
        ScenarioId::SupplyFault,
        ScenarioId::NoiseIntermittent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioId::TempDrift => "TempDrift",
            ScenarioId::SupplyFault => "SupplyFault",
            ScenarioId::NoiseIntermittent => "NoiseIntermittent",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "tempdrift" => Ok(ScenarioId::TempDrift),
            "supplyfault" => Ok(ScenarioId::SupplyFault),
            "noiseintermittent" | "noise" => Ok(ScenarioId::NoiseIntermittent),
            _ => Err(format!("unknown scenario: {s}")),
        }
    }
}

/// Mutable simulation state of one run. Owned by the engine; callers only
/// ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub run_id: String,
    pub scenario_id: ScenarioId,
    pub seed: i64,
    pub severity: f64,
    pub start_time: DateTime<Utc>,
    pub fault_injected: bool,
    pub action_applied: bool,

    pub temperature: f64,
    pub calibration_offset: f64,
    pub power_supply_voltage: f64,
    pub noise_sigma: f64,
    pub base_yield: f64,
}

impl ScenarioState {
    pub fn new(
        run_id: String,
        scenario_id: ScenarioId,
        seed: i64,
        severity: f64,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            scenario_id,
            seed,
            severity,
            start_time,
            fault_injected: false,
            action_applied: false,
            temperature: NOMINAL_TEMPERATURE_C,
            calibration_offset: NOMINAL_CALIBRATION_OFFSET,
            power_supply_voltage: NOMINAL_SUPPLY_VOLTAGE_V,
            noise_sigma: NOMINAL_NOISE_SIGMA,
            base_yield: NOMINAL_BASE_YIELD_PERCENT,
        }
    }

    /// Applies the scenario's fault rule. Linear in severity; severity is
    /// not clamped.
    pub fn inject_fault(&mut self) {
        self.fault_injected = true;

        match self.scenario_id {
            ScenarioId::TempDrift => {
                self.temperature = NOMINAL_TEMPERATURE_C + TEMP_DRIFT_SPAN_C * self.severity;
                self.calibration_offset = TEMP_DRIFT_CAL_SPAN * self.severity;
            }
            ScenarioId::SupplyFault => {
                self.power_supply_voltage = SUPPLY_FAULT_VOLTAGE_V;
            }
            ScenarioId::NoiseIntermittent => {
                self.noise_sigma = NOMINAL_NOISE_SIGMA + NOISE_SIGMA_SPAN * self.severity;
            }
        }
    }

    /// Applies a corrective action. Any action, including an unrecognised
    /// one, marks the run as remediated.
    pub fn apply_action(&mut self, action: &ActionType) {
        self.action_applied = true;

        match action {
            ActionType::Cooldown => self.temperature = NOMINAL_TEMPERATURE_C,
            ActionType::Recalibrate => self.calibration_offset = NOMINAL_CALIBRATION_OFFSET,
            ActionType::ResetSupply | ActionType::ReinitSequence => {
                self.power_supply_voltage = NOMINAL_SUPPLY_VOLTAGE_V;
            }
            ActionType::ReseatConnection => self.noise_sigma = NOMINAL_NOISE_SIGMA,
            ActionType::Other(_) => {}
        }
    }

    /// Unresolved faults only: zero once any action has been applied.
    pub fn yield_loss(&self) -> f64 {
        if !self.fault_injected || self.action_applied {
            return 0.0;
        }

        match self.scenario_id {
            ScenarioId::TempDrift => (self.temperature - NOMINAL_TEMPERATURE_C) * TEMP_YIELD_LOSS_PER_C,
            ScenarioId::SupplyFault => SUPPLY_FAULT_YIELD_LOSS,
            ScenarioId::NoiseIntermittent => self.noise_sigma * NOISE_YIELD_LOSS_PER_SIGMA,
        }
    }

    pub fn current_yield(&self) -> f64 {
        (self.base_yield - self.yield_loss()).max(0.0)
    }

    /// `draw` is a uniform sample in `[0, 1)`.
    pub fn measured_value(&self, draw: f64) -> f64 {
        NOMINAL_MEASURED_VALUE + self.calibration_offset + (draw - 0.5) * self.noise_sigma * 2.0
    }

    /// The single alarm the current state warrants, if any.
    pub fn alarm_condition(&self) -> Option<(AlarmCode, AlarmSeverity, String)> {
        if !self.fault_injected || self.action_applied {
            return None;
        }

        match self.scenario_id {
            ScenarioId::TempDrift if self.temperature > TEMP_ALARM_THRESHOLD_C => Some((
                AlarmCode::TempHigh,
                AlarmSeverity::Warning,
                format!("Temperature out of range: {:.1}°C", self.temperature),
            )),
            ScenarioId::SupplyFault => Some((
                AlarmCode::PsuFault,
                AlarmSeverity::Critical,
                "Power supply fault detected - test aborted".to_owned(),
            )),
            ScenarioId::NoiseIntermittent if self.noise_sigma > NOISE_ALARM_THRESHOLD => Some((
                AlarmCode::NoiseHigh,
                AlarmSeverity::Warning,
                "Intermittent signal noise detected".to_owned(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(scenario_id: ScenarioId, severity: f64) -> ScenarioState {
        ScenarioState::new("run".to_owned(), scenario_id, 7, severity, Utc::now())
    }

    #[test]
    fn test_defaults_are_nominal() {
        let s = state(ScenarioId::TempDrift, 0.5);
        assert_eq!(s.temperature, 25.0);
        assert_eq!(s.calibration_offset, 0.0);
        assert_eq!(s.power_supply_voltage, 3.3);
        assert_eq!(s.noise_sigma, 0.01);
        assert_eq!(s.base_yield, 95.0);
        assert!(!s.fault_injected);
        assert!(!s.action_applied);
        assert_eq!(s.yield_loss(), 0.0);
        assert!(s.alarm_condition().is_none());
    }

    #[test]
    fn test_temp_drift_boundaries() {
        let mut low = state(ScenarioId::TempDrift, 0.0);
        low.inject_fault();
        assert_eq!(low.temperature, 25.0);
        assert_eq!(low.calibration_offset, 0.0);
        assert!(low.alarm_condition().is_none());

        let mut high = state(ScenarioId::TempDrift, 1.0);
        high.inject_fault();
        assert_eq!(high.temperature, 40.0);
        assert_eq!(high.calibration_offset, 0.05);
        assert_eq!(high.yield_loss(), 30.0);
        assert_eq!(high.current_yield(), 65.0);
    }

    #[test]
    fn test_noise_rule_and_threshold() {
        let mut s = state(ScenarioId::NoiseIntermittent, 1.0);
        s.inject_fault();
        assert!((s.noise_sigma - 0.16).abs() < 1e-12);
        assert!((s.yield_loss() - 16.0).abs() < 1e-9);
        let (code, severity, _) = s.alarm_condition().unwrap();
        assert_eq!(code, AlarmCode::NoiseHigh);
        assert_eq!(severity, AlarmSeverity::Warning);

        // 0.01 + 0.15 * 0.5 = 0.085, below threshold
        let mut quiet = state(ScenarioId::NoiseIntermittent, 0.5);
        quiet.inject_fault();
        assert!(quiet.alarm_condition().is_none());
    }

    #[test]
    fn test_alarm_thresholds_are_strict() {
        let mut hot = state(ScenarioId::TempDrift, 0.0);
        hot.fault_injected = true;
        hot.temperature = TEMP_ALARM_THRESHOLD_C;
        assert!(hot.alarm_condition().is_none());
        hot.temperature = TEMP_ALARM_THRESHOLD_C + 1e-9;
        assert_eq!(hot.alarm_condition().unwrap().0, AlarmCode::TempHigh);

        let mut noisy = state(ScenarioId::NoiseIntermittent, 0.0);
        noisy.fault_injected = true;
        noisy.noise_sigma = NOISE_ALARM_THRESHOLD;
        assert!(noisy.alarm_condition().is_none());
        noisy.noise_sigma = NOISE_ALARM_THRESHOLD + 1e-9;
        assert_eq!(noisy.alarm_condition().unwrap().0, AlarmCode::NoiseHigh);
    }

    #[test]
    fn test_severity_just_past_alarm_threshold() {
        // 25 + 15 * 0.7 = 35.5
        let mut s = state(ScenarioId::TempDrift, 0.7);
        s.inject_fault();
        assert!(s.temperature > TEMP_ALARM_THRESHOLD_C);
        assert!(s.alarm_condition().is_some());
    }

    #[test]
    fn test_supply_fault_is_always_critical() {
        for severity in [0.0, 0.3, 1.0] {
            let mut s = state(ScenarioId::SupplyFault, severity);
            s.inject_fault();
            assert_eq!(s.power_supply_voltage, 0.0);
            let (code, level, _) = s.alarm_condition().unwrap();
            assert_eq!(code, AlarmCode::PsuFault);
            assert_eq!(level, AlarmSeverity::Critical);
            assert_eq!(s.current_yield(), 5.0);
        }
    }

    #[test]
    fn test_yield_never_negative() {
        let mut s = state(ScenarioId::SupplyFault, 1.0);
        s.base_yield = 40.0;
        s.inject_fault();
        assert_eq!(s.current_yield(), 0.0);
    }

    #[test]
    fn test_reset_supply_and_reinit_share_effect() {
        for action in [ActionType::ResetSupply, ActionType::ReinitSequence] {
            let mut s = state(ScenarioId::SupplyFault, 1.0);
            s.inject_fault();
            s.apply_action(&action);
            assert_eq!(s.power_supply_voltage, 3.3);
            assert!(s.action_applied);
        }
    }

    #[test]
    fn test_unknown_action_suppresses_alarm_without_physical_change() {
        let mut s = state(ScenarioId::TempDrift, 1.0);
        s.inject_fault();
        s.apply_action(&ActionType::from("TAP_THE_CHASSIS"));
        assert_eq!(s.temperature, 40.0);
        assert!(s.action_applied);
        assert!(s.alarm_condition().is_none());
        assert_eq!(s.yield_loss(), 0.0);
    }

    #[test]
    fn test_measured_value_spans_noise_band() {
        let mut s = state(ScenarioId::NoiseIntermittent, 1.0);
        s.inject_fault();
        assert!((s.measured_value(0.5) - 1.0).abs() < 1e-12);
        assert!((s.measured_value(0.0) - (1.0 - 0.16)).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_id_parsing() {
        assert_eq!("temp-drift".parse::<ScenarioId>(), Ok(ScenarioId::TempDrift));
        assert_eq!("SupplyFault".parse::<ScenarioId>(), Ok(ScenarioId::SupplyFault));
        assert_eq!("noise".parse::<ScenarioId>(), Ok(ScenarioId::NoiseIntermittent));
        assert!("brownout".parse::<ScenarioId>().is_err());
    }
}
