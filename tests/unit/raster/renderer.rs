use std::sync::Mutex;

use super::*;

fn opts(max_polygons: usize) -> RendererOpts {
    RendererOpts {
        max_polygons,
        frame_width: 64,
        frame_height: 20,
        threads: Some(2),
        ..RendererOpts::default()
    }
}

fn counting_target() -> (ScanlineTarget<Mutex<u64>, u32>, Arc<Mutex<u64>>) {
    let dest = Arc::new(Mutex::new(0u64));
    let target: ScanlineTarget<Mutex<u64>, u32> = ScanlineTarget::new(
        Arc::clone(&dest),
        None,
        Arc::new(|d: &Mutex<u64>, _: i32, e: &Extent, _: &u32, _: usize| {
            *d.lock().unwrap() += u64::from(e.len());
        }),
    );
    (target, dest)
}

fn tri() -> [Vertex; 3] {
    [
        Vertex::new(0.0, 0.0),
        Vertex::new(16.0, 0.0),
        Vertex::new(0.0, 16.0),
    ]
}

#[test]
fn bucket_count_rounds_up() {
    let r: Renderer<Mutex<u64>, u32> = Renderer::new(opts(8)).unwrap();
    assert_eq!(r.bucket_count(), 3);
    assert_eq!(r.frame(), ClipRect::new(0, 0, 63, 19));
}

#[test]
fn invalid_options_fail_construction() {
    let bad = RendererOpts {
        setup_workers: 0,
        ..opts(8)
    };
    assert!(Renderer::<Mutex<u64>>::new(bad).is_err());
}

#[test]
fn full_polygon_pool_forces_one_barrier() {
    let mut r = Renderer::new(opts(2)).unwrap();
    let (target, dest) = counting_target();
    let [a, b, c] = tri();

    let mut expected = 0u64;
    for _ in 0..3 {
        expected += u64::from(r.render_triangle(&target, 0, &a, &b, &c));
    }
    assert_eq!(r.stats().forced_waits, 1);
    assert_eq!(r.stats().frames, 1);
    assert_eq!(r.pending_polygons(), 1);

    r.wait();
    assert_eq!(*dest.lock().unwrap(), expected);
    assert_eq!(r.pending_polygons(), 0);
    assert_eq!(r.stats().polygons, 3);
}

#[test]
fn extra_data_is_committed_on_next_submission() {
    let mut r: Renderer<Mutex<Vec<u32>>, u32> = Renderer::new(opts(16)).unwrap();
    let dest = Arc::new(Mutex::new(Vec::new()));
    let target: ScanlineTarget<Mutex<Vec<u32>>, u32> = ScanlineTarget::new(
        Arc::clone(&dest),
        Some(ClipRect::new(0, 0, 63, 0)),
        Arc::new(|d: &Mutex<Vec<u32>>, _: i32, _: &Extent, extra: &u32, _: usize| {
            d.lock().unwrap().push(*extra);
        }),
    );
    let [a, b, c] = tri();

    r.render_triangle(&target, 0, &a, &b, &c);
    *r.extra_data() = 7;
    *r.extra_data() = 9;
    r.render_triangle(&target, 0, &a, &b, &c);
    r.wait();
    r.render_triangle(&target, 0, &a, &b, &c);
    r.wait();

    assert_eq!(*dest.lock().unwrap(), vec![0, 9, 9]);
}

#[test]
fn clip_outside_the_frame_submits_nothing() {
    let mut r = Renderer::new(opts(4)).unwrap();
    let (target, _) = counting_target();
    let off = target.with_clip(Some(ClipRect::new(100, 0, 120, 10)));
    let [a, b, c] = tri();

    assert_eq!(r.render_triangle(&off, 0, &a, &b, &c), 0);
    assert_eq!(r.pending_polygons(), 0);
    assert_eq!(r.stats().polygons, 0);
}

#[test]
fn triangle_beside_the_clip_schedules_no_buckets() {
    let mut r = Renderer::new(RendererOpts {
        frame_width: 128,
        frame_height: 64,
        ..opts(8)
    })
    .unwrap();
    let calls = Arc::new(Mutex::new(0u64));
    let target: ScanlineTarget<Mutex<u64>, u32> = ScanlineTarget::new(
        Arc::clone(&calls),
        Some(ClipRect::new(60, 0, 100, 40)),
        Arc::new(|d: &Mutex<u64>, _: i32, _: &Extent, _: &u32, _: usize| {
            *d.lock().unwrap() += 1;
        }),
    );
    let [a, b, c] = tri();

    assert_eq!(r.render_triangle(&target, 0, &a, &b, &c), 0);
    r.wait();

    let stats = r.stats();
    assert_eq!(stats.buckets_scheduled, 0);
    assert_eq!(stats.buckets_skipped, r.bucket_count() as u64);
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn oversized_param_count_is_clamped() {
    let mut r = Renderer::new(opts(4)).unwrap();
    let (target, _) = counting_target();
    let [a, b, c] = tri();
    let pixels = r.render_triangle(&target, MAX_VERTEX_PARAMS + 5, &a, &b, &c);
    assert!(pixels > 0);
    r.wait();
}
