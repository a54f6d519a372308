// Integration tests for SharedState written from worker threads and read on
// the UI tick

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tickwork::{
    Label, PoolConfig, RedrawFlag, SharedState, ThrottleConfig, UiLoop, WorkerPool,
};

#[test]
fn test_concurrent_writers_never_tear() {
    let state = Arc::new(SharedState::new((0_u64, 0_u64)));
    let writers: Vec<_> = (1..=4_u64)
        .map(|writer| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for step in 0..500 {
                    // Both halves always agree for a whole value.
                    let value = writer * 1_000 + step;
                    state.update((value, value));
                }
            })
        })
        .collect();

    for _ in 0..200 {
        let snapshot = state.snapshot();
        assert_eq!(snapshot.value.0, snapshot.value.1);
    }
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(state.version(), 2_000);
    let (left, right) = state.get();
    assert_eq!(left, right);
    assert_eq!(left % 1_000, 499);
}

#[test]
fn test_write_after_tick_is_seen_next_tick() {
    let flag = Arc::new(RedrawFlag::new());
    let mut ui = UiLoop::new(flag.clone());
    let state = Arc::new(SharedState::new(String::from("idle")));
    let label = ui.bind(state.clone(), Label::default());
    assert_eq!(label.borrow().text, "idle");

    state.update("loading".to_string());
    assert_eq!(ui.tick().applied, 1);
    assert_eq!(label.borrow().text, "loading");

    state.update("done".to_string());
    assert_eq!(label.borrow().text, "loading");
    assert_eq!(ui.tick().applied, 1);
    assert_eq!(label.borrow().text, "done");
    assert_eq!(ui.tick().applied, 0);
}

#[test]
fn test_pool_results_reach_widget() {
    let pool = WorkerPool::new(PoolConfig::with_workers(2)).unwrap();
    let flag = Arc::new(RedrawFlag::new());
    let mut ui = UiLoop::new(flag.clone());
    let state = Arc::new(SharedState::new(0_usize).with_host(flag.clone()));
    let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    ui.bind_with(state.clone(), move |value: &usize| sink.borrow_mut().push(*value));

    let futures: Vec<_> = (1..=5)
        .map(|value| {
            let state = Arc::clone(&state);
            pool.submit(move || {
                state.modify(|total| *total += value);
                Ok(())
            })
            .unwrap()
        })
        .collect();
    for future in &futures {
        future.wait(Some(Duration::from_secs(10))).unwrap();
    }

    assert!(flag.take());
    assert_eq!(ui.tick().applied, 1);
    assert_eq!(*seen.borrow(), vec![15]);
    pool.stop(true).unwrap();
}

#[test]
fn test_throttled_state_still_applies_latest() {
    let flag = Arc::new(RedrawFlag::new());
    let mut ui = UiLoop::new(flag.clone());
    let state = Arc::new(
        SharedState::new(0)
            .with_host(flag.clone())
            .with_throttle(ThrottleConfig::with_interval(Duration::from_secs(60))),
    );
    let latest = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&latest);
    ui.bind_with(state.clone(), move |value: &i32| *sink.borrow_mut() = *value);

    for value in 1..=50 {
        state.update(value);
    }
    assert_eq!(flag.request_count(), 1);

    ui.tick();
    assert_eq!(*latest.borrow(), 50);
}
