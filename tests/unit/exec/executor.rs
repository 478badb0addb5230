use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn zero_threads_is_rejected() {
    let err = Executor::new(Some(0)).unwrap_err();
    assert!(err.to_string().contains("validation error:"));
}

#[test]
fn wait_idle_covers_nested_spawns() {
    let exec = Arc::new(Executor::new(Some(3)).unwrap());
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..8 {
        let exec2 = Arc::clone(&exec);
        let hits2 = Arc::clone(&hits);
        exec.spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(2));
            let hits3 = Arc::clone(&hits2);
            exec2.spawn(move || {
                hits3.fetch_add(1, Ordering::SeqCst);
            });
            hits2.fetch_add(1, Ordering::SeqCst);
        });
    }

    exec.wait_idle();
    assert_eq!(hits.load(Ordering::SeqCst), 16);
    assert_eq!(exec.pending(), 0);
}

#[test]
fn panicking_task_does_not_wedge_wait() {
    let exec = Executor::new(Some(2)).unwrap();
    exec.spawn(|| panic!("callback blew up"));
    exec.wait_idle();
    assert_eq!(exec.pending(), 0);
}

#[test]
fn execution_contexts_are_in_range() {
    let exec = Arc::new(Executor::new(Some(2)).unwrap());
    assert_eq!(exec.context_count(), 3);
    assert_eq!(exec.current_context(), 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..16 {
        let exec2 = Arc::clone(&exec);
        let seen2 = Arc::clone(&seen);
        exec.spawn(move || {
            let ctx = exec2.current_context();
            lock(&seen2).push(ctx);
        });
    }
    exec.wait_idle();
    assert!(lock(&seen).iter().all(|&ctx| ctx < 2));
}
