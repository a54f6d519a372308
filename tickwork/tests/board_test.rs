// Integration tests for the process-wide progress board

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use lazy_static::lazy_static;
use tickwork::{board, ProgressBar, RedrawFlag, UiLoop};

lazy_static! {
    // The board is global; tests touching it must not interleave.
    static ref BOARD_LOCK: Mutex<()> = Mutex::new(());
}

fn serial() -> MutexGuard<'static, ()> {
    let guard = BOARD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    board::shutdown();
    guard
}

#[test]
fn test_report_without_board_is_ignored() {
    let _serial = serial();

    assert!(!board::is_open());
    assert!(board::report("bake", 1.0, 10.0, "Baking").is_none());
    assert!(board::status().is_none());
    assert!(!board::finish("bake"));
}

#[test]
fn test_open_is_idempotent() {
    let _serial = serial();
    let flag = Arc::new(RedrawFlag::new());

    assert!(board::open("Exports", flag.clone()));
    assert!(!board::open("Other title", flag.clone()));
    assert_eq!(board::status().unwrap().title, "Exports");
    assert!(flag.take());
    board::shutdown();
}

#[test]
fn test_closable_when_every_bar_finished() {
    let _serial = serial();
    let flag = Arc::new(RedrawFlag::new());
    board::open("Jobs", flag.clone());

    board::report("mesh", 1.0, 4.0, "Mesh");
    board::report("uv", 0.0, 2.0, "UV");
    let status = board::status().unwrap();
    assert_eq!(status.bars, vec!["mesh", "uv"]);
    assert!(!status.closable);

    board::report("mesh", 4.0, 4.0, "Mesh");
    assert!(!board::status().unwrap().closable);

    assert!(board::finish("uv"));
    let status = board::status().unwrap();
    assert_eq!(status.finished, vec!["mesh", "uv"]);
    assert!(status.closable);
    assert_eq!(board::bar("uv").unwrap().get().current, 2.0);

    // A bar restarted below its maximum reopens the board.
    board::report("mesh", 0.0, 4.0, "Mesh again");
    assert!(!board::status().unwrap().closable);

    assert_eq!(board::close_all(), 2);
    assert!(!board::is_open());
    assert_eq!(board::close_all(), 0);
}

#[test]
fn test_workers_report_into_bound_bars() {
    let _serial = serial();
    let flag = Arc::new(RedrawFlag::new());
    let mut ui = UiLoop::new(flag.clone());
    board::open("Render", flag.clone());

    let first = board::report("frames", 0.0, 100.0, "Frames").unwrap();
    let widget = ui.bind(first, ProgressBar::new());

    let workers: Vec<_> = (1..=4)
        .map(|step| {
            thread::spawn(move || {
                board::report("frames", f64::from(step) * 10.0, 100.0, "Frames");
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    board::report("frames", 100.0, 100.0, "Frames");

    ui.tick();
    assert!(widget.borrow().progress.is_complete());
    assert_eq!(widget.borrow().display_text(), "Frames 100%");
    assert!(board::status().unwrap().closable);
    assert_eq!(board::bars().len(), 1);
    board::shutdown();
}

#[test]
fn test_finished_mark_follows_last_value_under_contention() {
    let _serial = serial();
    board::open("Race", Arc::new(RedrawFlag::new()));

    for _ in 0..50 {
        thread::scope(|scope| {
            for value in [40.0, 100.0, 40.0, 100.0] {
                scope.spawn(move || {
                    board::report("shared", value, 100.0, "Shared");
                });
            }
        });

        let finished = board::status().unwrap().finished.contains(&"shared".to_string());
        let complete = board::bar("shared").unwrap().get().is_complete();
        assert_eq!(finished, complete);
    }
    board::shutdown();
}
