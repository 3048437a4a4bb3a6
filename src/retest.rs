//! Before/after comparison of a remediated run.
//!
//! A retest report summarises two windows of the same run: a baseline
//! (typically while the fault was active) and a retest (after corrective
//! action). Deltas are always `retest - baseline`.

use crate::error::{SimError, SimResult};
use crate::models::{RetestReport, TelemetryEvent, TestResult, TimeWindow};
use crate::store::EventStore;
use std::collections::BTreeMap;
use tracing::info;

pub const YIELD_PARAM: &str = "yield_percent";
const PASS_RATE_SUFFIX: &str = ".pass_rate";

fn telemetry_params(e: &TelemetryEvent) -> [(&'static str, f64); 6] {
    [
        ("temperature", e.temperature),
        ("calibration_offset", e.calibration_offset),
        ("power_supply_voltage", e.power_supply_voltage),
        ("noise_sigma", e.noise_sigma),
        ("measured_value", e.measured_value),
        (YIELD_PARAM, e.yield_percent),
    ]
}

/// Aggregates of one window.
#[derive(Debug, Clone, Default)]
struct WindowProfile {
    samples: usize,
    alarms: usize,
    means: BTreeMap<&'static str, f64>,
    pass_rates: BTreeMap<String, f64>,
}

impl WindowProfile {
    fn collect(store: &EventStore, run_id: &str, window: TimeWindow) -> Self {
        let telemetry = store.query_telemetry(run_id, window.start, window.end);
        let alarms = store.query_alarms(run_id, window.start, window.end).len();
        let results: Vec<TestResult> = store
            .query_test_results(run_id)
            .into_iter()
            .filter(|r| window.contains(r.timestamp))
            .collect();

        let mut sums: BTreeMap<&'static str, f64> = BTreeMap::new();
        for event in &telemetry {
            for (name, value) in telemetry_params(event) {
                *sums.entry(name).or_default() += value;
            }
        }
        let count = telemetry.len() as f64;
        let means = sums.into_iter().map(|(name, sum)| (name, sum / count)).collect();

        let mut tallies: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for result in &results {
            let entry = tallies.entry(result.param_name.clone()).or_default();
            entry.1 += 1;
            if result.pass_fail {
                entry.0 += 1;
            }
        }
        let pass_rates = tallies
            .into_iter()
            .map(|(name, (passed, total))| (name, passed as f64 / total as f64))
            .collect();

        Self {
            samples: telemetry.len(),
            alarms,
            means,
            pass_rates,
        }
    }
}

/// Builds [`RetestReport`]s from recorded events.
pub struct RetestAnalyzer<'a> {
    store: &'a EventStore,
}

impl<'a> RetestAnalyzer<'a> {
    pub fn new(store: &'a EventStore) -> Self {
        Self { store }
    }

    /// Compares `retest` against `baseline` for one run.
    ///
    /// The run counts as resolved when the retest window has telemetry, no
    /// alarms, and a mean yield no lower than the baseline's.
    pub fn compare(
        &self,
        run_id: &str,
        baseline: TimeWindow,
        retest: TimeWindow,
    ) -> SimResult<RetestReport> {
        for window in [baseline, retest] {
            if window.is_inverted() {
                return Err(SimError::InvalidWindow {
                    start: window.start,
                    end: window.end,
                });
            }
        }

        let before = WindowProfile::collect(self.store, run_id, baseline);
        let after = WindowProfile::collect(self.store, run_id, retest);

        let mut deltas = BTreeMap::new();
        for (name, retest_mean) in &after.means {
            if let Some(baseline_mean) = before.means.get(name) {
                deltas.insert((*name).to_owned(), retest_mean - baseline_mean);
            }
        }
        for (name, retest_rate) in &after.pass_rates {
            if let Some(baseline_rate) = before.pass_rates.get(name) {
                deltas.insert(format!("{name}{PASS_RATE_SUFFIX}"), retest_rate - baseline_rate);
            }
        }

        let yield_recovered = match (before.means.get(YIELD_PARAM), after.means.get(YIELD_PARAM)) {
            (Some(b), Some(a)) => a >= b,
            (None, Some(_)) => true,
            _ => false,
        };
        let resolved = after.samples > 0 && after.alarms == 0 && yield_recovered;

        let summary = summarize(&before, &after, deltas.get(YIELD_PARAM).copied(), resolved);
        info!(run_id, resolved, "retest comparison complete");

        Ok(RetestReport {
            run_id: run_id.to_owned(),
            baseline,
            retest,
            deltas,
            resolved,
            summary,
        })
    }
}

fn summarize(
    before: &WindowProfile,
    after: &WindowProfile,
    yield_delta: Option<f64>,
    resolved: bool,
) -> String {
    let verdict = if resolved { "RESOLVED" } else { "NOT RESOLVED" };
    let yield_text = match yield_delta {
        Some(delta) => format!("yield {delta:+.1} pts"),
        None => "yield delta unavailable".to_owned(),
    };
    format!(
        "{verdict}: baseline {} samples / {} alarms, retest {} samples / {} alarms, {yield_text}",
        before.samples, before.alarms, after.samples, after.alarms
    )
}
