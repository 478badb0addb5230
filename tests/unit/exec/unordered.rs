use super::*;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

fn executor(threads: usize) -> Arc<Executor> {
    Arc::new(Executor::new(Some(threads)).unwrap())
}

#[test]
fn every_item_is_processed_exactly_once() {
    let exec = executor(4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    let q = UnorderedWorkQueue::new(Arc::clone(&exec), 1024, 4, move |item: u32| {
        lock(&seen2).push(item);
    });

    for i in 0..500 {
        q.schedule(i).unwrap();
    }
    exec.wait_idle();

    let mut got = lock(&seen).clone();
    got.sort_unstable();
    assert_eq!(got, (0..500).collect::<Vec<_>>());
    assert!(q.is_empty());
    assert_eq!(q.active_workers(), 0);
}

#[test]
fn full_queue_hands_the_item_back() {
    let exec = executor(1);
    let gate = Arc::new((Mutex::new(false), std::sync::Condvar::new()));
    let gate2 = Arc::clone(&gate);
    let q = UnorderedWorkQueue::new(Arc::clone(&exec), 2, 1, move |_: u32| {
        let (open, cv) = &*gate2;
        let mut open = lock(open);
        while !*open {
            open = cv.wait(open).unwrap();
        }
    });

    // The first item is picked up by the pump and blocks on the gate, two more fill the buffer.
    q.schedule(0).unwrap();
    while q.len() != 0 {
        std::thread::yield_now();
    }
    q.schedule(1).unwrap();
    q.schedule(2).unwrap();
    assert_eq!(q.schedule(3), Err(3));
    assert_eq!(q.capacity(), 2);

    {
        let (open, cv) = &*gate;
        *lock(open) = true;
        cv.notify_all();
    }
    exec.wait_idle();
    assert!(q.schedule(3).is_ok());
    exec.wait_idle();
}

#[test]
fn pumps_never_exceed_worker_ceiling() {
    let exec = executor(8);
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (c2, p2) = (Arc::clone(&current), Arc::clone(&peak));
    let q = UnorderedWorkQueue::new(Arc::clone(&exec), 256, 3, move |_: u32| {
        let now = c2.fetch_add(1, Ordering::SeqCst) + 1;
        p2.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(1));
        c2.fetch_sub(1, Ordering::SeqCst);
    });

    for i in 0..64 {
        q.schedule(i).unwrap();
    }
    exec.wait_idle();
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[test]
fn work_can_schedule_into_its_own_queue() {
    type Q = UnorderedWorkQueue<u32, Box<dyn Fn(u32) + Send + Sync>>;

    let exec = executor(2);
    let count = Arc::new(AtomicUsize::new(0));
    let slot: Arc<OnceLock<Q>> = Arc::new(OnceLock::new());

    let (count2, slot2) = (Arc::clone(&count), Arc::clone(&slot));
    let work: Box<dyn Fn(u32) + Send + Sync> = Box::new(move |depth: u32| {
        count2.fetch_add(1, Ordering::SeqCst);
        if depth > 0
            && let Some(q) = slot2.get()
        {
            q.schedule(depth - 1).unwrap();
            q.schedule(depth - 1).unwrap();
        }
    });
    let q: Q = UnorderedWorkQueue::new(Arc::clone(&exec), 128, 2, work);
    let _ = slot.set(q.clone());

    q.schedule(4).unwrap();
    exec.wait_idle();
    // A binary tree of depth 4 has 31 nodes.
    assert_eq!(count.load(Ordering::SeqCst), 31);
}

#[test]
fn panicking_item_does_not_stop_the_pump() {
    let exec = executor(1);
    let done = Arc::new(AtomicUsize::new(0));
    let done2 = Arc::clone(&done);
    let q = UnorderedWorkQueue::new(Arc::clone(&exec), 16, 1, move |item: u32| {
        if item == 1 {
            panic!("bad item");
        }
        done2.fetch_add(1, Ordering::SeqCst);
    });
    for i in 0..4 {
        q.schedule(i).unwrap();
    }
    exec.wait_idle();
    assert_eq!(done.load(Ordering::SeqCst), 3);
}
