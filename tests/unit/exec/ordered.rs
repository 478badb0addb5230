use super::*;

fn executor(threads: usize) -> Arc<Executor> {
    Arc::new(Executor::new(Some(threads)).unwrap())
}

fn recording_queue(
    exec: &Arc<Executor>,
    capacity: usize,
) -> (
    OrderedWorkQueue<u32, impl Fn(&mut [u32]) + Send + Sync + 'static>,
    Arc<Mutex<Vec<Vec<u32>>>>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);
    let q = OrderedWorkQueue::new(Arc::clone(exec), capacity, move |items: &mut [u32]| {
        lock(&log2).push(items.to_vec());
    });
    (q, log)
}

#[test]
fn out_of_order_arrivals_execute_in_index_order() {
    let exec = executor(4);
    let (q, log) = recording_queue(&exec, 16);

    for i in [3usize, 1, 4, 0, 2] {
        q.schedule(i, i as u32 * 10).unwrap();
    }
    exec.wait_idle();

    let flat: Vec<u32> = lock(&log).iter().flatten().copied().collect();
    assert_eq!(flat, vec![0, 10, 20, 30, 40]);
    assert_eq!(q.next_index(), 5);
}

#[test]
fn skips_split_batches_and_count_as_processed() {
    let exec = executor(2);
    let (q, log) = recording_queue(&exec, 8);

    // Nothing can run until index 0 arrives, so the whole run is batched in one pump pass.
    q.schedule(1, 1).unwrap();
    q.schedule(2, 2).unwrap();
    q.skip(3).unwrap();
    q.schedule(4, 4).unwrap();
    q.skip(0).unwrap();
    exec.wait_idle();

    assert_eq!(*lock(&log), vec![vec![1, 2], vec![4]]);
    let st = q.stats();
    assert_eq!(st.next_index, 5);
    assert_eq!(st.executed, 3);
    assert_eq!(st.skipped, 2);
    assert!(q.is_drained(5));
}

#[test]
fn missing_index_stalls_the_queue() {
    let exec = executor(2);
    let (q, log) = recording_queue(&exec, 8);

    q.schedule(0, 0).unwrap();
    q.schedule(2, 2).unwrap();
    exec.wait_idle();
    assert_eq!(*lock(&log), vec![vec![0]]);
    assert!(!q.is_drained(3));
    assert!(q.reset().is_err());

    q.skip(1).unwrap();
    exec.wait_idle();
    assert_eq!(*lock(&log), vec![vec![0], vec![2]]);
    assert!(q.is_drained(3));
}

#[test]
fn duplicate_and_out_of_range_indices_are_rejected() {
    let exec = executor(1);
    let (q, _log) = recording_queue(&exec, 4);

    q.schedule(0, 0).unwrap();
    let dup = q.skip(0).unwrap_err();
    assert!(dup.to_string().contains("scheduling error:"));
    let oob = q.schedule(4, 4).unwrap_err();
    assert!(oob.to_string().contains("capacity error:"));
    exec.wait_idle();
}

#[test]
fn reset_allows_reuse_of_indices() {
    let exec = executor(2);
    let (q, log) = recording_queue(&exec, 4);

    for i in 0..4 {
        q.schedule(i, i as u32).unwrap();
    }
    exec.wait_idle();
    q.reset().unwrap();
    assert_eq!(q.next_index(), 0);
    assert_eq!(q.stats(), OrderedQueueStats::default());

    q.schedule(0, 100).unwrap();
    exec.wait_idle();
    let flat: Vec<u32> = lock(&log).iter().flatten().copied().collect();
    assert_eq!(flat, vec![0, 1, 2, 3, 100]);
}

#[test]
fn concurrent_producers_preserve_order() {
    let exec = executor(4);
    let (q, log) = recording_queue(&exec, 400);

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let q = q.clone();
            std::thread::spawn(move || {
                // Each producer owns the indices congruent to `t` and marks them back to front.
                for i in (0..100).rev() {
                    let index = i * 4 + t;
                    if index % 7 == 0 {
                        q.skip(index).unwrap();
                    } else {
                        q.schedule(index, index as u32).unwrap();
                    }
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    exec.wait_idle();

    let flat: Vec<u32> = lock(&log).iter().flatten().copied().collect();
    let expected: Vec<u32> = (0..400u32).filter(|i| i % 7 != 0).collect();
    assert_eq!(flat, expected);
    assert!(q.is_drained(400));
}
