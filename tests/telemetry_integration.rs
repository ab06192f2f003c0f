//! ---
//! gp_section: "15-testing-qa-runbook"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Cross-crate integration scenarios for the telemetry core."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::sync::Arc;

use gridpulse_alarm::{Alarm, Frame};
use gridpulse_common::config::AppConfig;
use gridpulse_common::seconds_to_ticks;
use gridpulse_dispatch::{LogicalThread, LogicalThreadScheduler};
use gridpulse_measure::{ImmediateMeasurements, Measurement, MeasurementKey, StateFlags};
use parking_lot::Mutex;

fn key(id: u64) -> MeasurementKey {
    MeasurementKey::new("pdc-east", id)
}

fn sample(id: u64, seconds: f64, value: f64) -> Measurement {
    Measurement::new(key(id), seconds_to_ticks(seconds), value, StateFlags::NORMAL)
}

const PIPELINE_CONFIG: &str = r#"
    [dispatch]
    priority_levels = 3
    max_workers = 4

    [cache]
    lag_time = 10.0
    lead_time = 5.0
    outlier_operation = "publish_value_as_nan"

    [[alarms]]
    id = 11
    tag_name = "BUS1:FREQ_HIGH"
    signals = ["pdc-east:1", "pdc-east:2"]
    operation = "greater_or_equal"
    combination = "and"
    set_point = 60.05
    hysteresis = 0.01
"#;

#[test]
fn config_driven_pipeline_raises_and_clears_an_alarm() {
    let config: AppConfig = PIPELINE_CONFIG.parse().expect("parse config");
    let scheduler = LogicalThreadScheduler::new(&config.dispatch).expect("scheduler");
    let cache = Arc::new(ImmediateMeasurements::from_config(&config.cache).expect("cache"));
    let alarm = Arc::new(Mutex::new(
        Alarm::from_definition(&config.alarms[0]).expect("alarm"),
    ));

    // All acquisition runs as actions on one logical thread, all alarm
    // evaluation on another; the per-thread mutual exclusion is what
    // serializes access, the mutex only satisfies Send bounds.
    let acquisition = LogicalThread::new(&scheduler);
    let evaluation = LogicalThread::new(&scheduler);

    let frames = [
        (0.0, vec![(1u64, 60.02), (2u64, 60.01)]),
        (1.0, vec![(1, 60.07), (2, 60.06)]),
        (2.0, vec![(1, 60.07), (2, 60.03)]),
    ];

    let mut transitions = Vec::new();
    for (seconds, values) in frames {
        let cache = cache.clone();
        let values_for_ingest = values.clone();
        acquisition
            .push(move || {
                for (id, value) in values_for_ingest {
                    cache.update(&sample(id, seconds, value));
                }
                Ok(())
            })
            .expect("push ingest action");

        let alarm = alarm.clone();
        let changed = evaluation
            .run_on(1, move || {
                let timestamp = seconds_to_ticks(seconds);
                let mut frame = Frame::new(timestamp);
                for (id, value) in values {
                    frame.insert(Measurement::new(
                        key(id),
                        timestamp,
                        value,
                        StateFlags::NORMAL,
                    ));
                }
                Ok(alarm.lock().test(&frame))
            })
            .expect("push evaluation")
            .wait()
            .expect("evaluation ran");
        transitions.push(changed);
    }

    // Frame 1 raises (both signals >= 60.05); frame 2 clears (signal 2
    // fell below 60.05 - 0.01).
    assert_eq!(transitions, vec![false, true, true]);
    let alarm = alarm.lock();
    assert!(!alarm.is_raised());
    assert_eq!(alarm.time_raised(), Some(seconds_to_ticks(1.0)));
    assert_eq!(
        alarm.cause().expect("cause").timestamp,
        seconds_to_ticks(1.0)
    );

    // The cache saw every ingest action.
    acquisition
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("ingest drained");
    let now = seconds_to_ticks(3.0);
    assert!((cache.adjusted_value(&key(1), now) - 60.07).abs() < f64::EPSILON);
    assert!((cache.adjusted_value(&key(2), now) - 60.03).abs() < f64::EPSILON);

    scheduler.shutdown();
}

#[test]
fn many_logical_threads_feed_the_cache_concurrently() {
    let config = AppConfig::default();
    let scheduler = LogicalThreadScheduler::new(&config.dispatch).expect("scheduler");
    let cache = Arc::new(ImmediateMeasurements::new(30.0, 5.0).expect("cache"));

    let threads: Vec<_> = (0..8).map(|_| LogicalThread::new(&scheduler)).collect();
    for (index, thread) in threads.iter().enumerate() {
        let id = index as u64 + 1;
        for step in 0..25 {
            let cache = cache.clone();
            thread
                .push(move || {
                    let seconds = 100.0 + step as f64;
                    cache.update(&sample(id, seconds, id as f64 * 10.0 + step as f64));
                    Ok(())
                })
                .expect("push update");
        }
        cache.add_tagged_measurement("feeders", key(id));
    }

    for thread in &threads {
        thread
            .run_on(1, || Ok(()))
            .expect("push marker")
            .wait()
            .expect("marker ran");
    }

    assert_eq!(cache.len(), 8);
    let now = seconds_to_ticks(125.0);
    // Each cell holds its final (step = 24) sample.
    let average = cache.tag_average("feeders", now).expect("tag average");
    let expected = (1..=8).map(|id| id as f64 * 10.0 + 24.0).sum::<f64>() / 8.0;
    assert!((average - expected).abs() < 1e-9);

    scheduler.shutdown();
}

#[test]
fn monitor_samples_statistics_while_the_pipeline_runs() {
    let config = AppConfig::default();
    let scheduler = LogicalThreadScheduler::new(&config.dispatch).expect("scheduler");
    let cache = Arc::new(ImmediateMeasurements::new(10.0, 5.0).expect("cache"));
    let ingest = LogicalThread::new(&scheduler);

    for step in 0..50 {
        let cache = cache.clone();
        ingest
            .push(move || {
                cache.update(&sample(1, 100.0 + step as f64, 42.0));
                Ok(())
            })
            .expect("push update");
    }
    ingest
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("marker ran");

    let window = ingest.sample_statistics();
    assert_eq!(window.execution_count, 51);
    assert!(window.average().is_some());
    assert_eq!(ingest.sample_statistics().execution_count, 0);

    scheduler.shutdown();
}
