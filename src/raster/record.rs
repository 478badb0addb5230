use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::{ClipRect, Extent, SCANLINES_PER_BUCKET, Vertex};
use crate::pool::shared::{PoolRun, SharedRunPool};

/// Per-scanline drawing callback.
///
/// Receives the destination, the absolute scanline, the extent to paint, the extra data
/// current at submission time, and the execution context (see [`crate::Executor::current_context`]).
/// Callbacks for different buckets run concurrently and must only touch their own scanlines.
pub type ScanlineFn<Dest, Extra> = Arc<dyn Fn(&Dest, i32, &Extent, &Extra, usize) + Send + Sync>;

/// Where and how a submission is drawn.
pub struct ScanlineTarget<Dest, Extra = ()> {
    /// Destination handed to every callback invocation.
    pub dest: Arc<Dest>,
    /// Optional clip rectangle; the renderer's frame bounds always apply.
    pub clip: Option<ClipRect>,
    /// Scanline callback.
    pub callback: ScanlineFn<Dest, Extra>,
}

impl<Dest, Extra> ScanlineTarget<Dest, Extra> {
    /// Bundle a destination, clip and callback.
    pub fn new(dest: Arc<Dest>, clip: Option<ClipRect>, callback: ScanlineFn<Dest, Extra>) -> Self {
        Self {
            dest,
            clip,
            callback,
        }
    }

    /// Same destination and callback with a different clip rectangle.
    pub fn with_clip(&self, clip: Option<ClipRect>) -> Self {
        Self {
            dest: Arc::clone(&self.dest),
            clip,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<Dest, Extra> Clone for ScanlineTarget<Dest, Extra> {
    fn clone(&self) -> Self {
        self.with_clip(self.clip)
    }
}

pub(crate) type ExtentPool = SharedRunPool<Extent, SCANLINES_PER_BUCKET>;

/// Geometry of one submitted primitive.
#[derive(Clone, Debug)]
pub(crate) enum Shape {
    Triangle([Vertex; 3]),
    Quad([Vertex; 4]),
    Polygon(SmallVec<[Vertex; 8]>),
    Extents {
        start_scanline: i32,
        extents: Vec<Extent>,
    },
}

/// Everything needed to set up and draw one primitive.
pub(crate) struct PolygonRecord<Dest, Extra> {
    pub(crate) sequence: usize,
    pub(crate) dest: Arc<Dest>,
    /// Caller clip already intersected with the frame.
    pub(crate) clip: ClipRect,
    pub(crate) callback: ScanlineFn<Dest, Extra>,
    pub(crate) param_count: usize,
    pub(crate) shape: Shape,
    pub(crate) extra: Arc<Extra>,
}

/// The part of a polygon that falls in one bucket: one extent per covered scanline.
pub(crate) struct BucketRecord<Dest, Extra> {
    pub(crate) polygon: Arc<PolygonRecord<Dest, Extra>>,
    pub(crate) first_scanline: i32,
    pub(crate) extents: PoolRun<Extent>,
}

impl<Dest, Extra> BucketRecord<Dest, Extra> {
    /// Invoke the polygon's callback for every scanline in this record.
    pub(crate) fn draw(&self, context: usize) {
        let poly = &*self.polygon;
        for (row, extent) in (self.first_scanline..).zip(self.extents.iter()) {
            (poly.callback)(&poly.dest, row, &*extent, &poly.extra, context);
        }
    }
}
