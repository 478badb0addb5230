//! polyscan is a parallel polygon scanline rasterizer.
//!
//! Callers submit triangles, quads, convex polygons or precomputed spans together with a
//! per-scanline callback. The renderer walks each primitive into horizontal [`Extent`]s with
//! interpolated parameters and calls back once per covered scanline, on a pool of workers.
//!
//! # Ordering
//!
//! Scanlines are grouped into buckets of [`SCANLINES_PER_BUCKET`]. Each bucket owns an
//! [`OrderedWorkQueue`], so callbacks for one bucket run strictly in submission order even
//! when setup finishes out of order. Different buckets draw concurrently.
//!
//! # Frames
//!
//! [`Renderer::wait`] is the only blocking call: it drains every queue and recycles per-frame
//! storage. Running out of per-frame storage forces the same barrier automatically.
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **No pixel ownership**: destinations are opaque to the renderer.
#![forbid(unsafe_code)]

mod foundation;
mod pool;

/// Worker pool and the two work queues built on it.
pub mod exec;
/// Primitive setup and the frame renderer.
pub mod raster;

pub use exec::executor::Executor;
pub use exec::ordered::{OrderedQueueStats, OrderedWorkQueue};
pub use exec::unordered::UnorderedWorkQueue;
pub use foundation::core::{
    ClipRect, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, Extent, ExtentParam,
    MAX_EXTENTS_PER_CHUNK, MAX_POLYGON_VERTICES, MAX_VERTEX_PARAMS, SCANLINES_PER_BUCKET, Vertex,
};
pub use foundation::error::{PolyscanError, PolyscanResult};
pub use raster::opts::RendererOpts;
pub use raster::record::{ScanlineFn, ScanlineTarget};
pub use raster::renderer::{RenderStats, Renderer};
