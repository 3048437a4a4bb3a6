use atetwin::*;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::thread;

#[test]
fn test_poll_record_query_cycle() {
    let engine = SimEngine::new();
    let store = EventStore::new();
    let started = Utc::now();

    let run_id = engine.start_run(ScenarioId::TempDrift, 1, 1.0);
    engine.inject_fault(&run_id);

    for _ in 0..3 {
        store.append(engine.generate_telemetry(&run_id).unwrap());
        if let Some(alarm) = engine.generate_alarm(&run_id) {
            store.append(alarm);
        }
    }

    let action = ActionCommand::new(&run_id, ActionType::Cooldown, "TEMP_HIGH raised")
        .with_parameter("target_c", 25.0);
    engine.apply_action(&run_id, &action);
    store.append(action.clone());

    for _ in 0..2 {
        store.append(engine.generate_telemetry(&run_id).unwrap());
        if let Some(alarm) = engine.generate_alarm(&run_id) {
            store.append(alarm);
        }
    }

    let end = Utc::now() + Duration::seconds(1);
    let telemetry = store.query_telemetry(&run_id, started, end);
    assert_eq!(telemetry.len(), 5);
    assert!(telemetry[..3].iter().all(|t| t.temperature == 40.0 && t.yield_percent == 65.0));
    assert!(telemetry[3..].iter().all(|t| t.temperature == 25.0 && t.yield_percent == 95.0));
    assert!(telemetry.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let alarms = store.query_alarms(&run_id, started, end);
    assert_eq!(alarms.len(), 3);
    assert!(alarms.iter().all(|a| a.code == AlarmCode::TempHigh));

    assert_eq!(store.get_actions(&run_id), vec![action]);
}

#[test]
fn test_runs_are_isolated() {
    let engine = SimEngine::new();
    let drift = engine.start_run(ScenarioId::TempDrift, 1, 1.0);
    let psu = engine.start_run(ScenarioId::SupplyFault, 1, 1.0);

    engine.inject_fault(&psu);

    assert!(engine.generate_alarm(&drift).is_none());
    assert_eq!(engine.get_state(&drift).unwrap().power_supply_voltage, 3.3);
    assert_eq!(engine.generate_alarm(&psu).unwrap().code, AlarmCode::PsuFault);
}

#[test]
fn test_shared_engine_and_store_across_threads() {
    let engine = Arc::new(SimEngine::new());
    let store = Arc::new(EventStore::new());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let scenario = ScenarioId::ALL[worker % ScenarioId::ALL.len()];
                let run_id = engine.start_run(scenario, 7, 1.0);
                engine.inject_fault(&run_id);
                for _ in 0..25 {
                    store.append(engine.generate_telemetry(&run_id).unwrap());
                    if let Some(alarm) = engine.generate_alarm(&run_id) {
                        store.append(alarm);
                    }
                }
                run_id
            })
        })
        .collect();

    let run_ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut unique = run_ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);
    assert_eq!(engine.run_ids(), unique);

    let stats = store.stats();
    assert_eq!(stats.telemetry, 100);
    let far_past = Utc::now() - Duration::hours(1);
    let far_future = Utc::now() + Duration::hours(1);
    for run_id in &run_ids {
        assert_eq!(store.query_telemetry(run_id, far_past, far_future).len(), 25);
    }
}

#[test]
fn test_engine_config_from_json() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"equipment_id":"ATE-007","seed_mode":"CallIndex"}"#).unwrap();
    let engine = SimEngine::with_config(config);
    assert_eq!(engine.config().seed_mode, SeedMode::CallIndex);

    let run_id = engine.start_run(ScenarioId::NoiseIntermittent, 0, 0.0);
    let telemetry = engine.generate_telemetry(&run_id).unwrap();
    assert_eq!(telemetry.equipment_id, "ATE-007");
    assert_eq!(telemetry.yield_percent, 95.0);
}
