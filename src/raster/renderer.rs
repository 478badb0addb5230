use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::exec::executor::Executor;
use crate::exec::ordered::OrderedWorkQueue;
use crate::exec::unordered::UnorderedWorkQueue;
use crate::foundation::core::{
    ClipRect, Extent, MAX_EXTENTS_PER_CHUNK, MAX_POLYGON_VERTICES, MAX_VERTEX_PARAMS,
    SCANLINES_PER_BUCKET, Vertex,
};
use crate::foundation::error::PolyscanResult;
use crate::pool::fixed::FixedPool;
use crate::raster::opts::RendererOpts;
use crate::raster::record::{BucketRecord, ExtentPool, PolygonRecord, ScanlineTarget, Shape};
use crate::raster::setup::{BucketSink, EdgeFlags, rasterize};

type DrawFn<Dest, Extra> = Box<dyn Fn(&mut [BucketRecord<Dest, Extra>]) + Send + Sync>;
type BucketQueue<Dest, Extra> = OrderedWorkQueue<BucketRecord<Dest, Extra>, DrawFn<Dest, Extra>>;
type SetupFn<Dest, Extra> = Box<dyn Fn(Arc<PolygonRecord<Dest, Extra>>) + Send + Sync>;
type SetupQueue<Dest, Extra> =
    UnorderedWorkQueue<Arc<PolygonRecord<Dest, Extra>>, SetupFn<Dest, Extra>>;

/// Lifetime counters of a [`Renderer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Barriers completed.
    pub frames: u64,
    /// Primitives submitted, after fan/strip/chunk expansion.
    pub polygons: u64,
    /// Pixels covered by completed setups.
    pub pixels: u64,
    pub buckets_scheduled: u64,
    pub buckets_skipped: u64,
    /// Buckets lost because no extent block could be allocated.
    pub dropped_buckets: u64,
    /// Barriers forced by a full polygon or extra-data pool.
    pub forced_waits: u64,
}

#[derive(Default)]
struct StageCounters {
    pixels: AtomicU64,
    buckets_scheduled: AtomicU64,
    buckets_skipped: AtomicU64,
    dropped_buckets: AtomicU64,
}

/// State shared between the submitting thread and setup workers.
struct Stage<Dest, Extra> {
    buckets: Vec<BucketQueue<Dest, Extra>>,
    runs: ExtentPool,
    edges: EdgeFlags,
    counters: StageCounters,
}

impl<Dest, Extra> Stage<Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Send + Sync + 'static,
{
    fn setup(&self, polygon: &Arc<PolygonRecord<Dest, Extra>>) -> u32 {
        let mut sink = StageSink {
            stage: self,
            sequence: polygon.sequence,
        };
        let pixels = rasterize(polygon, self.edges, &self.runs, &mut sink);
        self.counters
            .pixels
            .fetch_add(u64::from(pixels), Ordering::Relaxed);
        pixels
    }
}

struct StageSink<'a, Dest, Extra> {
    stage: &'a Stage<Dest, Extra>,
    sequence: usize,
}

impl<Dest, Extra> BucketSink<Dest, Extra> for StageSink<'_, Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Send + Sync + 'static,
{
    fn bucket_count(&self) -> usize {
        self.stage.buckets.len()
    }

    fn schedule(&mut self, bucket: usize, record: BucketRecord<Dest, Extra>) {
        match self.stage.buckets[bucket].schedule(self.sequence, record) {
            Ok(()) => {
                self.stage
                    .counters
                    .buckets_scheduled
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::error!(bucket, sequence = self.sequence, %err, "bucket record rejected");
            }
        }
    }

    fn skip(&mut self, bucket: usize) {
        match self.stage.buckets[bucket].skip(self.sequence) {
            Ok(()) => {
                self.stage
                    .counters
                    .buckets_skipped
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::error!(bucket, sequence = self.sequence, %err, "bucket skip rejected");
            }
        }
    }

    fn dropped(&mut self, bucket: usize) {
        self.stage
            .counters
            .dropped_buckets
            .fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            bucket,
            sequence = self.sequence,
            "no extent block available; bucket dropped"
        );
    }
}

/// Parallel scanline renderer.
///
/// Primitives are set up into per-scanline [`Extent`]s and drawn through the target's callback
/// on the executor's workers. Within a bucket of [`SCANLINES_PER_BUCKET`] scanlines, callbacks
/// run in submission order; different buckets draw concurrently. [`Renderer::wait`] is the
/// frame barrier.
///
/// `Extra` is per-polygon user data. [`Renderer::extra_data`] opens a new value that every
/// following submission sees until the next call.
pub struct Renderer<Dest, Extra = ()>
where
    Dest: Send + Sync + 'static,
    Extra: Default + Send + Sync + 'static,
{
    opts: RendererOpts,
    executor: Arc<Executor>,
    stage: Arc<Stage<Dest, Extra>>,
    setup_queue: Option<SetupQueue<Dest, Extra>>,
    polygons: FixedPool<PolygonRecord<Dest, Extra>>,
    extras: FixedPool<Extra>,
    current_extra: Arc<Extra>,
    pending_extra: Option<Extra>,
    frame: ClipRect,
    submitted: u64,
    forced_waits: u64,
    frames: u64,
}

impl<Dest, Extra> Renderer<Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Default + Send + Sync + 'static,
{
    /// Build a renderer with its own executor.
    pub fn new(opts: RendererOpts) -> PolyscanResult<Self> {
        opts.validate()?;
        let executor = Arc::new(Executor::new(opts.threads)?);
        Self::with_executor(opts, executor)
    }

    /// Build a renderer that runs on a shared executor.
    ///
    /// `opts.threads` is ignored. [`Renderer::wait`] waits for every task on the executor,
    /// including other renderers' work.
    pub fn with_executor(opts: RendererOpts, executor: Arc<Executor>) -> PolyscanResult<Self> {
        opts.validate()?;

        let bucket_count = (opts.frame_height as usize).div_ceil(SCANLINES_PER_BUCKET);
        let buckets = (0..bucket_count)
            .map(|_| {
                OrderedWorkQueue::new(
                    Arc::clone(&executor),
                    opts.max_polygons,
                    draw_fn(Arc::clone(&executor)),
                )
            })
            .collect();
        let runs = opts
            .run_block_limit
            .map_or_else(ExtentPool::new, ExtentPool::with_block_limit);
        let stage = Arc::new(Stage {
            buckets,
            runs,
            edges: EdgeFlags {
                right: opts.include_right_edge,
                bottom: opts.include_bottom_edge,
            },
            counters: StageCounters::default(),
        });

        let setup_queue = (!opts.inline_setup).then(|| {
            let stage = Arc::clone(&stage);
            let work: SetupFn<Dest, Extra> = Box::new(move |polygon| {
                stage.setup(&polygon);
            });
            UnorderedWorkQueue::new(
                Arc::clone(&executor),
                opts.max_polygons,
                opts.setup_workers,
                work,
            )
        });

        tracing::debug!(
            buckets = bucket_count,
            threads = executor.num_threads(),
            inline_setup = opts.inline_setup,
            "renderer ready"
        );

        Ok(Self {
            frame: ClipRect::frame(opts.frame_width, opts.frame_height),
            polygons: FixedPool::new(opts.max_polygons),
            extras: FixedPool::new(opts.max_polygons),
            current_extra: Arc::new(Extra::default()),
            pending_extra: None,
            opts,
            executor,
            stage,
            setup_queue,
            submitted: 0,
            forced_waits: 0,
            frames: 0,
        })
    }

    /// Submit a triangle. Returns the pixels covered, or 0 when setup is deferred.
    pub fn render_triangle(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
    ) -> u32 {
        self.submit(target, param_count, Shape::Triangle([*v1, *v2, *v3]))
    }

    /// Submit a convex quad given in outline order.
    pub fn render_quad(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
        v4: &Vertex,
    ) -> u32 {
        self.submit(target, param_count, Shape::Quad([*v1, *v2, *v3, *v4]))
    }

    /// Submit a convex polygon of 3 to [`MAX_POLYGON_VERTICES`] vertices in outline order.
    ///
    /// Other vertex counts are rejected with a warning and cover nothing.
    pub fn render_polygon(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        verts: &[Vertex],
    ) -> u32 {
        if !(3..=MAX_POLYGON_VERTICES).contains(&verts.len()) {
            tracing::warn!(
                vertices = verts.len(),
                max = MAX_POLYGON_VERTICES,
                "polygon rejected"
            );
            return 0;
        }
        self.submit(
            target,
            param_count,
            Shape::Polygon(SmallVec::from_slice(verts)),
        )
    }

    /// Submit a triangle fan: `(v0, v[i], v[i + 1])` for each consecutive pair after `v0`.
    pub fn render_triangle_fan(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        verts: &[Vertex],
    ) -> u32 {
        let Some((first, rest)) = verts.split_first() else {
            return 0;
        };
        rest.windows(2).fold(0u32, |pixels, pair| {
            pixels.saturating_add(self.render_triangle(
                target,
                param_count,
                first,
                &pair[0],
                &pair[1],
            ))
        })
    }

    /// Submit a triangle strip: `(v[i], v[i + 1], v[i + 2])` for each window of three.
    pub fn render_triangle_strip(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        verts: &[Vertex],
    ) -> u32 {
        verts.windows(3).fold(0u32, |pixels, tri| {
            pixels.saturating_add(self.render_triangle(
                target,
                param_count,
                &tri[0],
                &tri[1],
                &tri[2],
            ))
        })
    }

    /// Submit a quad fan: each pair of new vertices forms a quad with `v0` and the vertex before
    /// the pair. A trailing single vertex closes the fan with a triangle-shaped quad.
    pub fn render_quad_fan(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        verts: &[Vertex],
    ) -> u32 {
        let len = verts.len();
        if len < 3 {
            return 0;
        }
        let mut pixels = 0u32;
        for n in (2..len).step_by(2) {
            let last = (n + 1).min(len - 1);
            pixels = pixels.saturating_add(self.render_quad(
                target,
                param_count,
                &verts[0],
                &verts[n - 1],
                &verts[n],
                &verts[last],
            ));
        }
        pixels
    }

    /// Submit precomputed spans, one per scanline starting at `start_scanline`.
    ///
    /// Spans are clipped like any other primitive and every parameter slot is forwarded.
    /// Runs longer than [`MAX_EXTENTS_PER_CHUNK`] are submitted as several primitives.
    pub fn render_extents(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        start_scanline: i32,
        extents: &[Extent],
    ) -> u32 {
        let mut pixels = 0u32;
        let mut scanline = start_scanline;
        for chunk in extents.chunks(MAX_EXTENTS_PER_CHUNK) {
            let shape = Shape::Extents {
                start_scanline: scanline,
                extents: chunk.to_vec(),
            };
            pixels = pixels.saturating_add(self.submit(target, MAX_VERTEX_PARAMS, shape));
            scanline = scanline.saturating_add(MAX_EXTENTS_PER_CHUNK as i32);
        }
        pixels
    }

    /// Start a new extra-data value for the following submissions.
    ///
    /// Polygons already submitted keep the value they were submitted with. The value stays
    /// current across [`Renderer::wait`].
    pub fn extra_data(&mut self) -> &mut Extra {
        self.pending_extra.insert(Extra::default())
    }

    /// Block until every submitted polygon has been drawn, then recycle per-frame storage.
    #[tracing::instrument(skip(self), fields(polygons = self.polygons.len()))]
    pub fn wait(&mut self) {
        self.executor.wait_idle();

        for (bucket, queue) in self.stage.buckets.iter().enumerate() {
            if let Err(err) = queue.reset() {
                tracing::error!(bucket, %err, "bucket queue not drained at barrier");
            }
        }
        self.polygons.release_all();
        self.extras.release_all();
        self.stage.runs.release_all();
        self.frames += 1;

        let runs = self.stage.runs.stats();
        tracing::debug!(
            frame = self.frames,
            blocks = runs.blocks_allocated,
            outstanding = runs.blocks_outstanding,
            grows = runs.grow_events,
            alloc_failures = runs.alloc_failures,
            detached = self.polygons.detached(),
            "frame drained"
        );
    }

    /// Counters accumulated since construction.
    ///
    /// In deferred mode `pixels` and the bucket counters trail submissions until the barrier.
    pub fn stats(&self) -> RenderStats {
        let c = &self.stage.counters;
        RenderStats {
            frames: self.frames,
            polygons: self.submitted,
            pixels: c.pixels.load(Ordering::Relaxed),
            buckets_scheduled: c.buckets_scheduled.load(Ordering::Relaxed),
            buckets_skipped: c.buckets_skipped.load(Ordering::Relaxed),
            dropped_buckets: c.dropped_buckets.load(Ordering::Relaxed),
            forced_waits: self.forced_waits,
        }
    }

    /// Polygons submitted since the last barrier.
    pub fn pending_polygons(&self) -> usize {
        self.polygons.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.stage.buckets.len()
    }

    /// Frame bounds every submission is clipped to.
    pub fn frame(&self) -> ClipRect {
        self.frame
    }

    pub fn opts(&self) -> &RendererOpts {
        &self.opts
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    fn submit(
        &mut self,
        target: &ScanlineTarget<Dest, Extra>,
        param_count: usize,
        shape: Shape,
    ) -> u32 {
        let clip = target
            .clip
            .map_or(self.frame, |clip| clip.intersect(self.frame));
        if clip.is_empty() {
            return 0;
        }
        let param_count = if param_count > MAX_VERTEX_PARAMS {
            tracing::warn!(
                param_count,
                max = MAX_VERTEX_PARAMS,
                "parameter count clamped"
            );
            MAX_VERTEX_PARAMS
        } else {
            param_count
        };

        if self.polygons.is_exhausted()
            || (self.pending_extra.is_some() && self.extras.is_exhausted())
        {
            self.forced_waits += 1;
            tracing::debug!(
                capacity = self.polygons.capacity(),
                "per-frame pool exhausted; forcing a barrier"
            );
            self.wait();
        }
        self.commit_extra();

        let record = PolygonRecord {
            sequence: self.polygons.len(),
            dest: Arc::clone(&target.dest),
            clip,
            callback: Arc::clone(&target.callback),
            param_count,
            shape,
            extra: Arc::clone(&self.current_extra),
        };
        let Ok(polygon) = self.polygons.acquire(record) else {
            tracing::error!("polygon pool full after barrier; submission discarded");
            return 0;
        };
        self.submitted += 1;

        match &self.setup_queue {
            None => self.stage.setup(&polygon),
            Some(queue) => {
                if let Err(polygon) = queue.schedule(polygon) {
                    self.stage.setup(&polygon);
                }
                0
            }
        }
    }

    fn commit_extra(&mut self) {
        let Some(value) = self.pending_extra.take() else {
            return;
        };
        self.current_extra = match self.extras.acquire(value) {
            Ok(shared) => shared,
            Err(value) => Arc::new(value),
        };
    }
}

impl<Dest, Extra> Drop for Renderer<Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Default + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.executor.wait_idle();
    }
}

impl<Dest, Extra> std::fmt::Debug for Renderer<Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Default + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("opts", &self.opts)
            .field("pending_polygons", &self.polygons.len())
            .field("stats", &self.stats())
            .finish()
    }
}

fn draw_fn<Dest, Extra>(executor: Arc<Executor>) -> DrawFn<Dest, Extra>
where
    Dest: Send + Sync + 'static,
    Extra: Send + Sync + 'static,
{
    Box::new(move |records: &mut [BucketRecord<Dest, Extra>]| {
        let context = executor.current_context();
        for record in records.iter() {
            record.draw(context);
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/raster/renderer.rs"]
mod tests;
