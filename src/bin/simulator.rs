use atetwin::models::TimeWindow;
use atetwin::{
    ActionCommand, AlarmSeverity, EngineConfig, EventStore, RetestAnalyzer, ScenarioId, SimEngine,
    TelemetryEvent, TestResult,
};
use chrono::Utc;
use clap::{App, Arg};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKS: &str = "20";
const DEFAULT_INTERVAL_MS: &str = "250";
const DEFAULT_INJECT_AT: &str = "3";
const DEFAULT_ACTION_AT: &str = "12";

// Parametric limits applied to every measured value sample
const MEASURED_PARAM: &str = "measured_value";
const MEASURED_SPEC_MIN: f64 = 0.95;
const MEASURED_SPEC_MAX: f64 = 1.05;

struct RunPlan {
    scenario: ScenarioId,
    seed: i64,
    severity: f64,
    ticks: u32,
    interval_ms: u64,
    inject_at: u32,
    action: Option<String>,
    action_at: u32,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("atetwin-sim")
        .version("0.1.0")
        .author("Test Systems Engineering Team")
        .about("ATE digital twin - drive a fault scenario and record its telemetry")
        .arg(
            Arg::with_name("scenario")
                .short("s")
                .long("scenario")
                .value_name("SCENARIO")
                .help("Fault scenario to simulate")
                .takes_value(true)
                .possible_values(&["temp-drift", "supply-fault", "noise"])
                .default_value("temp-drift"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("SEED")
                .help("Base random seed")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("1")
                .validator(|v| v.parse::<i64>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("severity")
                .long("severity")
                .value_name("SEVERITY")
                .help("Fault severity, nominally 0.0 to 1.0")
                .takes_value(true)
                .default_value("1.0")
                .validator(|v| v.parse::<f64>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("ticks")
                .short("n")
                .long("ticks")
                .value_name("TICKS")
                .help("Number of telemetry polls")
                .takes_value(true)
                .default_value(DEFAULT_TICKS)
                .validator(|v| v.parse::<u32>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("interval")
                .long("interval-ms")
                .value_name("MS")
                .help("Polling interval in milliseconds")
                .takes_value(true)
                .default_value(DEFAULT_INTERVAL_MS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(0) => Err("Interval must be positive".into()),
                    Ok(_) => Ok(()),
                    Err(e) => Err(e.to_string()),
                }),
        )
        .arg(
            Arg::with_name("inject-at")
                .long("inject-at")
                .value_name("TICK")
                .help("Tick at which the fault is injected")
                .takes_value(true)
                .default_value(DEFAULT_INJECT_AT)
                .validator(|v| v.parse::<u32>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("action")
                .short("a")
                .long("action")
                .value_name("ACTION")
                .help("Corrective action type, e.g. COOLDOWN, RESET_SUPPLY")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("action-at")
                .long("action-at")
                .value_name("TICK")
                .help("Tick at which the corrective action is applied")
                .takes_value(true)
                .default_value(DEFAULT_ACTION_AT)
                .validator(|v| v.parse::<u32>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Engine configuration (JSON)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = match matches.value_of("config") {
        Some(path) => serde_json::from_str::<EngineConfig>(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    // Validators above guarantee these parse.
    let plan = RunPlan {
        scenario: matches.value_of("scenario").unwrap_or("temp-drift").parse()?,
        seed: matches.value_of("seed").unwrap_or("1").parse()?,
        severity: matches.value_of("severity").unwrap_or("1.0").parse()?,
        ticks: matches.value_of("ticks").unwrap_or(DEFAULT_TICKS).parse()?,
        interval_ms: matches.value_of("interval").unwrap_or(DEFAULT_INTERVAL_MS).parse()?,
        inject_at: matches.value_of("inject-at").unwrap_or(DEFAULT_INJECT_AT).parse()?,
        action: matches.value_of("action").map(str::to_owned),
        action_at: matches.value_of("action-at").unwrap_or(DEFAULT_ACTION_AT).parse()?,
        json: matches.value_of("format") == Some("json"),
    };

    let engine = Arc::new(SimEngine::with_config(config));
    let store = Arc::new(EventStore::new());

    run_scenario(&plan, &engine, &store).await;
    Ok(())
}

async fn run_scenario(plan: &RunPlan, engine: &Arc<SimEngine>, store: &Arc<EventStore>) {
    if !plan.json {
        println!("{}", "🔬 ATE Digital Twin".bright_blue().bold());
        println!("=====================");
    }

    let run_id = engine.start_run(plan.scenario, plan.seed, plan.severity);
    let run_start = Utc::now();
    let mut action_time = None;

    let mut interval = time::interval(Duration::from_millis(plan.interval_ms));

    for tick in 0..plan.ticks {
        interval.tick().await;

        if tick == plan.inject_at {
            engine.inject_fault(&run_id);
            if !plan.json {
                println!("{} fault injected ({})", "⚡".yellow(), plan.scenario);
            }
        }

        if let Some(action_type) = plan.action.as_ref().filter(|_| tick == plan.action_at) {
            let action = ActionCommand::new(&run_id, action_type.as_str(), "scheduled remediation")
                .with_parameter("tick", tick);
            action_time = Some(Utc::now());
            engine.apply_action(&run_id, &action);
            store.append(action);
            if !plan.json {
                println!("{} action applied ({})", "🔧".green(), action_type);
            }
        }

        let telemetry = match engine.generate_telemetry(&run_id) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                warn!("telemetry generation failed: {}", e);
                break;
            }
        };

        let result = TestResult::evaluate(
            telemetry.timestamp,
            &run_id,
            MEASURED_PARAM,
            telemetry.measured_value,
            MEASURED_SPEC_MIN,
            MEASURED_SPEC_MAX,
        );

        print_sample(tick, &telemetry, &result, plan.json);
        store.append(result);
        store.append(telemetry);

        if let Some(alarm) = engine.generate_alarm(&run_id) {
            if plan.json {
                println!("{}", serde_json::to_string(&alarm).unwrap_or_default());
            } else {
                let label = format!("[{} {}]", alarm.severity, alarm.code);
                let label = match alarm.severity {
                    AlarmSeverity::Critical => label.bright_red().bold(),
                    AlarmSeverity::Warning => label.yellow(),
                };
                println!("      {} {}", label, alarm.message);
            }
            store.append(alarm);
        }
    }

    let run_end = Utc::now();
    let stats = store.stats();
    info!(
        run_id = %run_id,
        telemetry = stats.telemetry,
        alarms = stats.alarms,
        test_results = stats.test_results,
        actions = stats.actions,
        "scenario finished"
    );

    let Some(action_time) = action_time else {
        if !plan.json {
            println!("{}", "No corrective action applied; skipping retest comparison.".dimmed());
        }
        return;
    };

    let analyzer = RetestAnalyzer::new(store);
    let report = analyzer.compare(
        &run_id,
        TimeWindow::new(run_start, action_time),
        TimeWindow::new(action_time, run_end),
    );

    match report {
        Ok(report) if plan.json => {
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
        Ok(report) => {
            println!();
            println!("{}", "📋 Retest Report".bright_blue().bold());
            let summary = if report.resolved {
                report.summary.bright_green()
            } else {
                report.summary.bright_red()
            };
            println!("{summary}");
            for (param, delta) in &report.deltas {
                println!("  {:<28} {:+.4}", param.bright_white(), delta);
            }
        }
        Err(e) => warn!("retest comparison failed: {}", e),
    }
}

fn print_sample(tick: u32, telemetry: &TelemetryEvent, result: &TestResult, json: bool) {
    if json {
        println!("{}", serde_json::to_string(telemetry).unwrap_or_default());
        return;
    }

    let verdict = if result.pass_fail {
        "PASS".bright_green()
    } else {
        "FAIL".bright_red()
    };
    println!(
        "{:>4}  T={:>5.1}°C  cal={:+.3}  psu={:.2}V  σ={:.3}  meas={:.4} {}  yield={:>5.1}%",
        tick,
        telemetry.temperature,
        telemetry.calibration_offset,
        telemetry.power_supply_voltage,
        telemetry.noise_sigma,
        telemetry.measured_value,
        verdict,
        telemetry.yield_percent,
    );
}
