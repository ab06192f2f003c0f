//! ---
//! gp_section: "05-concurrency-dispatch"
//! gp_subsection: "module"
//! gp_type: "source"
//! gp_scope: "code"
//! gp_description: "Logical threads and the cooperative worker-pool scheduler."
//! gp_version: "v0.0.0-prealpha"
//! gp_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use gridpulse_common::config::DispatchConfig;
use gridpulse_dispatch::{DispatchError, LogicalThread, LogicalThreadScheduler};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scheduler(priority_levels: usize, max_workers: usize) -> LogicalThreadScheduler {
    LogicalThreadScheduler::new(&DispatchConfig {
        priority_levels,
        max_workers,
    })
    .expect("scheduler start")
}

#[test]
fn fifo_within_priority_and_strict_priority_order() {
    let scheduler = scheduler(3, 1);
    let thread = LogicalThread::new(&scheduler);

    // Hold the single worker inside a gate action so the later pushes all
    // land before anything drains.
    let (release, gate) = mpsc::channel::<()>();
    thread
        .push_at(3, move || {
            gate.recv().expect("gate release");
            Ok(())
        })
        .expect("push gate");

    let order = Arc::new(Mutex::new(Vec::new()));
    for (label, priority) in [("A", 2), ("B", 1), ("C", 2)] {
        let order = order.clone();
        thread
            .push_at(priority, move || {
                order.lock().push(label);
                Ok(())
            })
            .expect("push action");
    }

    release.send(()).expect("open gate");
    thread
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("marker ran");

    assert_eq!(*order.lock(), vec!["A", "C", "B"]);
}

#[test]
fn actions_on_one_logical_thread_never_overlap() {
    let scheduler = scheduler(3, 8);
    let thread = LogicalThread::new(&scheduler);

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let in_flight = in_flight.clone();
        let max_observed = max_observed.clone();
        thread
            .push(move || {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_micros(50));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("push action");
    }

    thread
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("marker ran");

    assert_eq!(max_observed.load(Ordering::SeqCst), 1);
}

#[test]
fn priorities_outside_the_configured_range_are_rejected() {
    let scheduler = scheduler(3, 1);
    let thread = LogicalThread::new(&scheduler);

    assert!(matches!(
        thread.push_at(0, || Ok(())),
        Err(DispatchError::InvalidPriority {
            priority: 0,
            levels: 3
        })
    ));
    assert!(matches!(
        thread.push_at(4, || Ok(())),
        Err(DispatchError::InvalidPriority {
            priority: 4,
            levels: 3
        })
    ));
}

#[test]
fn faulting_actions_reach_observers_and_do_not_stall_dispatch() {
    let scheduler = scheduler(3, 2);
    let thread = LogicalThread::new(&scheduler);

    let faults = Arc::new(Mutex::new(Vec::new()));
    let faults_clone = faults.clone();
    thread.on_fault(move |error| {
        faults_clone.lock().push(format!("{error}"));
    });

    thread
        .push(|| Err(anyhow::anyhow!("breaker state mismatch")))
        .expect("push failing action");
    thread
        .push(|| panic!("unexpected frame"))
        .expect("push panicking action");

    // Dispatch must keep making progress on the same thread afterwards.
    let value = thread
        .run_on(1, || Ok(21 * 2))
        .expect("push follow-up")
        .wait()
        .expect("follow-up ran");
    assert_eq!(value, 42);

    let recorded = faults.lock();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].contains("breaker state mismatch"));
    assert!(recorded[1].contains("unexpected frame"));
}

#[test]
fn completion_handles_propagate_action_failure() {
    let scheduler = scheduler(3, 1);
    let thread = LogicalThread::new(&scheduler);

    let result = thread
        .run_on::<u32, _>(2, || Err(anyhow::anyhow!("sensor offline")))
        .expect("push action")
        .wait();

    match result {
        Err(DispatchError::ActionFailed(message)) => assert!(message.contains("sensor offline")),
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[test]
fn thread_local_state_is_shared_across_sequential_actions() {
    let scheduler = scheduler(3, 4);
    let thread = LogicalThread::new(&scheduler);
    thread.set_local("processed", 0u64);

    for _ in 0..10 {
        let handle = thread.clone();
        thread
            .push(move || {
                let processed: u64 = handle.local("processed").unwrap_or_default();
                handle.set_local("processed", processed + 1);
                Ok(())
            })
            .expect("push action");
    }

    thread
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("marker ran");

    assert_eq!(thread.local::<u64>("processed"), Some(10));
}

#[test]
fn statistics_sampling_swaps_in_a_zeroed_window() {
    let scheduler = scheduler(3, 2);
    let thread = LogicalThread::new(&scheduler);

    for _ in 0..5 {
        thread
            .push(|| {
                std::thread::sleep(Duration::from_micros(200));
                Ok(())
            })
            .expect("push action");
    }
    thread
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait()
        .expect("marker ran");

    let window = thread.sample_statistics();
    assert_eq!(window.execution_count, 6);
    assert!(window.total_time > Duration::ZERO);
    assert!(window.min_time.is_some());
    assert!(window.max_time.unwrap() >= window.min_time.unwrap());

    let reset = thread.sample_statistics();
    assert_eq!(reset.execution_count, 0);
    assert_eq!(reset.average(), None);
}

#[test]
fn shutdown_is_idempotent_and_rejects_further_pushes() {
    let scheduler = scheduler(3, 2);
    let thread = LogicalThread::new(&scheduler);

    thread.push(|| Ok(())).expect("push before shutdown");
    scheduler.shutdown();
    scheduler.shutdown();

    assert!(scheduler.is_shut_down());
    assert!(matches!(
        thread.push(|| Ok(())),
        Err(DispatchError::SchedulerShutdown)
    ));
}

#[test]
fn clear_discards_only_unstarted_actions() {
    let scheduler = scheduler(3, 1);
    let thread = LogicalThread::new(&scheduler);

    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release, gate) = mpsc::channel::<()>();
    let executed = Arc::new(AtomicUsize::new(0));

    let executed_gate = executed.clone();
    thread
        .push_at(3, move || {
            started_tx.send(()).expect("announce gate");
            gate.recv().expect("gate release");
            executed_gate.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("push gate");
    started_rx.recv().expect("gate started");

    for _ in 0..4 {
        let executed = executed.clone();
        thread
            .push(move || {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("push action");
    }

    thread.clear();
    release.send(()).expect("open gate");

    // Only the in-flight gate action survives the clear.
    thread
        .run_on(1, || Ok(()))
        .expect("push marker")
        .wait_for(Duration::from_secs(5))
        .expect("marker resolved")
        .expect("marker ran");

    assert_eq!(executed.load(Ordering::SeqCst), 1);
}

#[test]
fn randomized_pushes_all_execute_exactly_once() {
    let scheduler = scheduler(5, 6);
    let mut rng = StdRng::seed_from_u64(0x6F1D);
    let executed = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..4).map(|_| LogicalThread::new(&scheduler)).collect();
    let total = 500;
    for _ in 0..total {
        let target = &threads[rng.gen_range(0..threads.len())];
        let priority = rng.gen_range(1..=5);
        let executed = executed.clone();
        target
            .push_at(priority, move || {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("push action");
    }

    for thread in &threads {
        thread
            .run_on(1, || Ok(()))
            .expect("push marker")
            .wait()
            .expect("marker ran");
    }

    assert_eq!(executed.load(Ordering::SeqCst), total);
}
