use super::*;

#[test]
fn acquire_until_exhausted_then_value_is_handed_back() {
    let mut pool = FixedPool::<u32>::new(3);
    for expected in 0..3u32 {
        assert_eq!(pool.len(), expected as usize);
        let shared = pool.acquire(expected * 10).expect("slot available");
        assert_eq!(*shared, expected * 10);
    }
    assert!(pool.is_exhausted());
    assert_eq!(pool.acquire(99).unwrap_err(), 99);
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.capacity(), 3);
}

#[test]
fn release_all_rewinds_and_reuses_slots_in_place() {
    let mut pool = FixedPool::<u64>::new(2);
    let handle = pool.acquire(7).unwrap();
    drop(handle);
    pool.release_all();
    assert_eq!(pool.len(), 0);
    assert!(!pool.is_exhausted());

    let handle = pool.acquire(8).unwrap();
    assert_eq!(*handle, 8);
    assert_eq!(pool.detached(), 0);
}

#[test]
fn release_all_is_idempotent() {
    let mut pool = FixedPool::<u8>::new(1);
    pool.acquire(1).unwrap();
    pool.release_all();
    pool.release_all();
    assert_eq!(pool.len(), 0);
    assert_eq!(*pool.acquire(2).unwrap(), 2);
}

#[test]
fn stale_reader_keeps_its_value_after_reuse() {
    let mut pool = FixedPool::<u64>::new(1);
    let reader = pool.acquire(99).unwrap();
    pool.release_all();

    let fresh = pool.acquire(1).unwrap();
    assert_eq!(*fresh, 1);
    assert_eq!(*reader, 99);
    assert_eq!(pool.detached(), 1);
}
