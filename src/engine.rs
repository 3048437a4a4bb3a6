use crate::error::{SimError, SimResult};
use crate::models::{ActionCommand, AlarmEvent, TelemetryEvent, DEFAULT_EQUIPMENT_ID};
use crate::scenario::{ScenarioId, ScenarioState};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const RUN_ID_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// How the per-sample random seed is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeedMode {
    /// Base seed plus whole seconds elapsed since the run started. Samples
    /// taken within the same second draw the same value.
    #[default]
    WallClockSeconds,
    /// Base seed plus the number of samples already generated for the run.
    CallIndex,
}

/// Configuration for the simulation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub equipment_id: String,
    pub seed_mode: SeedMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            equipment_id: DEFAULT_EQUIPMENT_ID.to_owned(),
            seed_mode: SeedMode::default(),
        }
    }
}

/// Scenario simulation engine.
///
/// Owns the state of every run started in this process. All operations take
/// `&self`; the run table sits behind a reader/writer lock so one engine can
/// be shared across threads or tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct SimEngine {
    config: EngineConfig,
    runs: RwLock<HashMap<String, ScenarioState>>,
    /// Samples drawn per run; only advanced in `SeedMode::CallIndex`.
    sample_counts: Mutex<HashMap<String, u64>>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            runs: RwLock::new(HashMap::new()),
            sample_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a new run with nominal physical state and returns its id.
    ///
    /// Ids have the form `<scenario>_<yyyyMMddHHmmss>_<seed>`; a `-N` suffix
    /// is added if that id was already handed out.
    pub fn start_run(&self, scenario_id: ScenarioId, seed: i64, severity: f64) -> String {
        let start_time = Utc::now();
        let base_id = format!(
            "{}_{}_{}",
            scenario_id,
            start_time.format(RUN_ID_TIME_FORMAT),
            seed
        );

        let mut runs = self.write_runs();
        let mut run_id = base_id.clone();
        let mut suffix = 1u32;
        while runs.contains_key(&run_id) {
            suffix += 1;
            run_id = format!("{base_id}-{suffix}");
        }

        let state = ScenarioState::new(run_id.clone(), scenario_id, seed, severity, start_time);
        runs.insert(run_id.clone(), state);

        info!(run_id = %run_id, scenario = %scenario_id, seed, severity, "run started");
        run_id
    }

    /// Applies the run's fault rule. Returns `false` (and changes nothing)
    /// for an unknown run.
    pub fn inject_fault(&self, run_id: &str) -> bool {
        self.try_inject_fault(run_id).is_ok()
    }

    pub fn try_inject_fault(&self, run_id: &str) -> SimResult<()> {
        let mut runs = self.write_runs();
        let Some(state) = runs.get_mut(run_id) else {
            debug!(run_id, "fault injection skipped: unknown run");
            return Err(SimError::RunNotFound(run_id.to_owned()));
        };

        state.inject_fault();
        info!(
            run_id,
            scenario = %state.scenario_id,
            severity = state.severity,
            temperature = state.temperature,
            calibration_offset = state.calibration_offset,
            power_supply_voltage = state.power_supply_voltage,
            noise_sigma = state.noise_sigma,
            "fault injected"
        );
        Ok(())
    }

    /// Applies a corrective action. Returns `false` for an unknown run.
    ///
    /// An unrecognised action type still marks the run as remediated, which
    /// suppresses further alarms even though nothing physical changed.
    pub fn apply_action(&self, run_id: &str, action: &ActionCommand) -> bool {
        self.try_apply_action(run_id, action).is_ok()
    }

    pub fn try_apply_action(&self, run_id: &str, action: &ActionCommand) -> SimResult<()> {
        let mut runs = self.write_runs();
        let Some(state) = runs.get_mut(run_id) else {
            debug!(run_id, action = %action.action_type, "action skipped: unknown run");
            return Err(SimError::RunNotFound(run_id.to_owned()));
        };

        if !action.action_type.is_known() {
            warn!(
                run_id,
                action = %action.action_type,
                "unrecognised action type; run marked remediated without physical change"
            );
        }

        state.apply_action(&action.action_type);
        info!(run_id, action = %action.action_type, reason = %action.reason, "action applied");
        Ok(())
    }

    /// Synthesizes a telemetry snapshot for the current instant.
    ///
    /// The event is not recorded anywhere; appending it to an
    /// [`EventStore`](crate::store::EventStore) is up to the caller.
    pub fn generate_telemetry(&self, run_id: &str) -> SimResult<TelemetryEvent> {
        let now = Utc::now();
        let runs = self.read_runs();
        let state = runs
            .get(run_id)
            .ok_or_else(|| SimError::RunNotFound(run_id.to_owned()))?;

        let sample_seed = self.sample_seed(state, now);

        let mut rng = StdRng::seed_from_u64(sample_seed);
        let draw: f64 = rng.gen();

        Ok(TelemetryEvent {
            timestamp: now,
            run_id: run_id.to_owned(),
            equipment_id: self.config.equipment_id.clone(),
            temperature: state.temperature,
            calibration_offset: state.calibration_offset,
            power_supply_voltage: state.power_supply_voltage,
            noise_sigma: state.noise_sigma,
            measured_value: state.measured_value(draw),
            yield_percent: state.current_yield(),
        })
    }

    /// Returns at most one alarm for a faulted, unremediated run.
    pub fn generate_alarm(&self, run_id: &str) -> Option<AlarmEvent> {
        let runs = self.read_runs();
        let state = runs.get(run_id)?;
        let (code, severity, message) = state.alarm_condition()?;

        debug!(run_id, code = %code, severity = %severity, "{}", message);
        Some(AlarmEvent {
            timestamp: Utc::now(),
            run_id: run_id.to_owned(),
            code,
            severity,
            message,
        })
    }

    pub fn get_state(&self, run_id: &str) -> Option<ScenarioState> {
        self.read_runs().get(run_id).cloned()
    }

    /// Ids of every run started so far, sorted.
    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_runs().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn sample_seed(&self, state: &ScenarioState, now: DateTime<Utc>) -> u64 {
        let offset = match self.config.seed_mode {
            SeedMode::WallClockSeconds => (now - state.start_time).num_seconds(),
            SeedMode::CallIndex => {
                let mut counts = self
                    .sample_counts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let count = counts.entry(state.run_id.clone()).or_insert(0);
                let index = *count;
                *count = count.saturating_add(1);
                i64::try_from(index).unwrap_or(i64::MAX)
            }
        };
        // Reinterpreting the sign bit keeps negative seeds distinct.
        state.seed.wrapping_add(offset) as u64
    }

    fn read_runs(&self) -> RwLockReadGuard<'_, HashMap<String, ScenarioState>> {
        self.runs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_runs(&self) -> RwLockWriteGuard<'_, HashMap<String, ScenarioState>> {
        self.runs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
