//! Scanline setup: turns a submitted primitive into per-bucket runs of extents.
//!
//! Every primitive is walked top to bottom, one scanline at a time, sampling edges and
//! parameters at pixel centres (`x + 0.5`, `y + 0.5`). The walk is split at bucket boundaries
//! and each bucket is either handed a filled record or explicitly skipped, so the ordered
//! bucket queues never wait on a polygon that had nothing for them.

use std::ops::Range;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::{
    ClipRect, Extent, ExtentParam, MAX_VERTEX_PARAMS, SCANLINES_PER_BUCKET, Vertex,
};
use crate::foundation::math::{DEGENERATE_EPSILON, ParamPlane, edge_dxdy, round_coordinate};
use crate::raster::record::{BucketRecord, ExtentPool, PolygonRecord, Shape};

/// Optional one-pixel growth on the closing edges of a span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EdgeFlags {
    /// Add a pixel to the right end of every non-extents span.
    pub(crate) right: bool,
    /// Walk one extra scanline past the bottom vertex.
    pub(crate) bottom: bool,
}

/// Receiver for the per-bucket output of a setup pass.
///
/// For every bucket in `0..bucket_count()` setup calls exactly one of `schedule` or `skip`.
/// `dropped` is reported before the `skip` of a bucket whose run could not be allocated.
pub(crate) trait BucketSink<Dest, Extra> {
    fn bucket_count(&self) -> usize;
    fn schedule(&mut self, bucket: usize, record: BucketRecord<Dest, Extra>);
    fn skip(&mut self, bucket: usize);
    fn dropped(&mut self, bucket: usize);
}

/// Set up `polygon` and hand its buckets to `sink`. Returns the number of pixels covered.
pub(crate) fn rasterize<Dest, Extra>(
    polygon: &Arc<PolygonRecord<Dest, Extra>>,
    edges: EdgeFlags,
    runs: &ExtentPool,
    sink: &mut impl BucketSink<Dest, Extra>,
) -> u32 {
    let clip = polygon.clip;
    let count = polygon.param_count.min(MAX_VERTEX_PARAMS);
    match &polygon.shape {
        Shape::Triangle(verts) => dispatch(
            polygon,
            TriangleWalk::new(verts, count, clip, edges),
            runs,
            sink,
        ),
        Shape::Quad(verts) => dispatch(
            polygon,
            PolygonWalk::new(verts, count, clip, edges),
            runs,
            sink,
        ),
        Shape::Polygon(verts) => dispatch(
            polygon,
            PolygonWalk::new(verts, count, clip, edges),
            runs,
            sink,
        ),
        Shape::Extents {
            start_scanline,
            extents,
        } => dispatch(
            polygon,
            ExtentsWalk::new(*start_scanline, extents, clip),
            runs,
            sink,
        ),
    }
}

trait ScanlineWalk {
    /// Scanlines produced, already clipped.
    fn rows(&self) -> Range<i32>;

    /// Fill the extent for scanline `y` and return its pixel count.
    ///
    /// Called with strictly increasing `y`, possibly with gaps.
    fn fill(&mut self, y: i32, extent: &mut Extent) -> u32;
}

fn dispatch<Dest, Extra, W: ScanlineWalk>(
    polygon: &Arc<PolygonRecord<Dest, Extra>>,
    walk: Option<W>,
    runs: &ExtentPool,
    sink: &mut impl BucketSink<Dest, Extra>,
) -> u32 {
    let rows = walk.as_ref().map_or(0..0, W::rows);
    let mut walk = walk;
    let mut pixels = 0u32;

    for bucket in 0..sink.bucket_count() {
        let top = (bucket * SCANLINES_PER_BUCKET) as i32;
        let first = rows.start.max(top);
        let end = rows.end.min(top + SCANLINES_PER_BUCKET as i32);

        let Some(w) = walk.as_mut().filter(|_| first < end) else {
            sink.skip(bucket);
            continue;
        };
        let Some(run) = runs.acquire((end - first) as usize) else {
            sink.dropped(bucket);
            sink.skip(bucket);
            continue;
        };
        for (y, mut extent) in (first..end).zip(run.iter()) {
            pixels = pixels.saturating_add(w.fill(y, &mut *extent));
        }
        sink.schedule(
            bucket,
            BucketRecord {
                polygon: Arc::clone(polygon),
                first_scanline: first,
                extents: run,
            },
        );
    }
    pixels
}

/// Clamp `[start, stop)` to the clip columns and store it. Empty spans collapse onto a single
/// in-bounds column.
fn store_span(extent: &mut Extent, start: i32, stop: i32, clip: ClipRect) -> u32 {
    let limit = clip.max_x.saturating_add(1);
    let start = start.max(clip.min_x);
    let stop = stop.min(limit);
    if start >= stop {
        let at = start.min(limit);
        extent.startx = at;
        extent.stopx = at;
        return 0;
    }
    extent.startx = start;
    extent.stopx = stop;
    extent.len()
}

fn scanline_rows(top: i32, bottom: i32, edges: EdgeFlags, clip: ClipRect) -> Option<Range<i32>> {
    let first = top.max(clip.min_y);
    let end = bottom
        .saturating_add(i32::from(edges.bottom))
        .min(clip.max_y.saturating_add(1));
    (first < end).then_some(first..end)
}

/// Whether spans bounded by vertex columns `min_x..=max_x` can reach any clip column.
fn columns_reach_clip(min_x: f32, max_x: f32, edges: EdgeFlags, clip: ClipRect) -> bool {
    let stop = round_coordinate(max_x).saturating_add(i32::from(edges.right));
    stop > clip.min_x && round_coordinate(min_x) <= clip.max_x
}

fn column_bounds(verts: &[Vertex]) -> (f32, f32) {
    verts.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v.x), hi.max(v.x))
    })
}

struct TriangleWalk {
    v1: Vertex,
    v2: Vertex,
    dxdy_v1v2: f32,
    dxdy_v1v3: f32,
    dxdy_v2v3: f32,
    plane: ParamPlane,
    count: usize,
    clip: ClipRect,
    right: bool,
    rows: Range<i32>,
}

impl TriangleWalk {
    fn new(verts: &[Vertex; 3], count: usize, clip: ClipRect, edges: EdgeFlags) -> Option<Self> {
        let mut v = *verts;
        v.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));
        let [v1, v2, v3] = v;

        let (min_x, max_x) = column_bounds(&v);
        if !columns_reach_clip(min_x, max_x, edges, clip) {
            return None;
        }
        let rows = scanline_rows(
            round_coordinate(v1.y),
            round_coordinate(v3.y),
            edges,
            clip,
        )?;

        let plane = ParamPlane::solve(&v1, &v2, &v3, count);
        if plane.degenerate && count > 0 {
            tracing::trace!(y = v1.y, "zero-area triangle; parameters held at first vertex");
        }

        Some(Self {
            dxdy_v1v2: edge_dxdy(&v1, &v2),
            dxdy_v1v3: edge_dxdy(&v1, &v3),
            dxdy_v2v3: edge_dxdy(&v2, &v3),
            plane,
            v1,
            v2,
            count,
            clip,
            right: edges.right,
            rows,
        })
    }
}

impl ScanlineWalk for TriangleWalk {
    fn rows(&self) -> Range<i32> {
        self.rows.clone()
    }

    fn fill(&mut self, y: i32, extent: &mut Extent) -> u32 {
        let fully = y as f32 + 0.5;
        let startx = self.v1.x + (fully - self.v1.y) * self.dxdy_v1v3;
        let stopx = if fully < self.v2.y {
            self.v1.x + (fully - self.v1.y) * self.dxdy_v1v2
        } else {
            self.v2.x + (fully - self.v2.y) * self.dxdy_v2v3
        };

        let mut istart = round_coordinate(startx);
        let mut istop = round_coordinate(stopx);
        if istart > istop {
            std::mem::swap(&mut istart, &mut istop);
        }
        if self.right {
            istop = istop.saturating_add(1);
        }

        let pixels = store_span(extent, istart, istop, self.clip);
        let fullx = extent.startx as f32 + 0.5;
        for (i, param) in extent.params[..self.count].iter_mut().enumerate() {
            *param = ExtentParam {
                start: self.plane.eval(i, fullx, fully),
                dpdx: self.plane.dpdx[i],
            };
        }
        pixels
    }
}

#[derive(Clone, Debug)]
struct Edge {
    /// Upper vertex index.
    a: usize,
    /// Lower vertex index.
    b: usize,
    dxdy: f32,
    dpdy: [f32; MAX_VERTEX_PARAMS],
}

type EdgeList = SmallVec<[Edge; 4]>;

/// Edge walk for convex quads and N-gons.
///
/// The outline is split at its top and bottom vertices into a forward chain (increasing
/// vertex index) and a backward chain; one becomes the left edge list, the other the right.
struct PolygonWalk<'a> {
    verts: &'a [Vertex],
    left: EdgeList,
    right: EdgeList,
    li: usize,
    ri: usize,
    max_y: f32,
    count: usize,
    clip: ClipRect,
    right_edge: bool,
    rows: Range<i32>,
}

impl<'a> PolygonWalk<'a> {
    fn new(verts: &'a [Vertex], count: usize, clip: ClipRect, edges: EdgeFlags) -> Option<Self> {
        if verts.len() < 3 {
            return None;
        }
        let (min_x, max_x) = column_bounds(verts);
        if !columns_reach_clip(min_x, max_x, edges, clip) {
            return None;
        }

        let mut minv = 0;
        let mut maxv = 0;
        for (i, v) in verts.iter().enumerate().skip(1) {
            if v.y < verts[minv].y {
                minv = i;
            }
            if v.y > verts[maxv].y {
                maxv = i;
            }
        }

        let rows = scanline_rows(
            round_coordinate(verts[minv].y),
            round_coordinate(verts[maxv].y),
            edges,
            clip,
        )?;

        let forward = edge_chain(verts, minv, maxv, true, count);
        let backward = edge_chain(verts, minv, maxv, false, count);
        let (Some(f0), Some(b0)) = (forward.first(), backward.first()) else {
            return None;
        };

        let forward_is_left = if f0.a == b0.a {
            f0.dxdy < b0.dxdy
        } else {
            verts[f0.a].x < verts[b0.a].x
        };
        let (left, right) = if forward_is_left {
            (forward, backward)
        } else {
            (backward, forward)
        };

        Some(Self {
            verts,
            left,
            right,
            li: 0,
            ri: 0,
            max_y: verts[maxv].y,
            count,
            clip,
            right_edge: edges.right,
            rows,
        })
    }

    fn advance(&self, edges: &EdgeList, mut idx: usize, fully: f32) -> usize {
        while fully > self.verts[edges[idx].b].y && fully < self.max_y && idx + 1 < edges.len() {
            idx += 1;
        }
        idx
    }
}

/// Non-horizontal edges from `from` to `to`, stepping forward or backward around the outline.
fn edge_chain(verts: &[Vertex], from: usize, to: usize, forward: bool, count: usize) -> EdgeList {
    let n = verts.len();
    let mut list = EdgeList::new();
    let mut cur = from;
    while cur != to {
        let next = if forward { (cur + 1) % n } else { (cur + n - 1) % n };
        let (a, b) = (&verts[cur], &verts[next]);
        if a.y != b.y {
            let ooy = 1.0 / (b.y - a.y);
            let mut dpdy = [0.0; MAX_VERTEX_PARAMS];
            for (i, d) in dpdy[..count].iter_mut().enumerate() {
                *d = (b.params[i] - a.params[i]) * ooy;
            }
            list.push(Edge {
                a: cur,
                b: next,
                dxdy: (b.x - a.x) * ooy,
                dpdy,
            });
        }
        cur = next;
    }
    list
}

impl ScanlineWalk for PolygonWalk<'_> {
    fn rows(&self) -> Range<i32> {
        self.rows.clone()
    }

    fn fill(&mut self, y: i32, extent: &mut Extent) -> u32 {
        let fully = y as f32 + 0.5;
        self.li = self.advance(&self.left, self.li, fully);
        self.ri = self.advance(&self.right, self.ri, fully);
        let l = &self.left[self.li];
        let r = &self.right[self.ri];
        let (la, ra) = (&self.verts[l.a], &self.verts[r.a]);

        let startx = la.x + (fully - la.y) * l.dxdy;
        let stopx = ra.x + (fully - ra.y) * r.dxdy;
        let istart = round_coordinate(startx);
        let mut istop = round_coordinate(stopx);
        if self.right_edge {
            istop = istop.saturating_add(1);
        }

        let pixels = store_span(extent, istart, istop, self.clip);
        let width = stopx - startx;
        let offset = (extent.startx as f32 + 0.5) - startx;
        let (ldy, rdy) = (fully - la.y, fully - ra.y);
        for (i, param) in extent.params[..self.count].iter_mut().enumerate() {
            let lparam = la.params[i] + ldy * l.dpdy[i];
            let rparam = ra.params[i] + rdy * r.dpdy[i];
            let dpdx = if width.abs() > DEGENERATE_EPSILON {
                (rparam - lparam) / width
            } else {
                0.0
            };
            *param = ExtentParam {
                start: lparam + offset * dpdx,
                dpdx,
            };
        }
        pixels
    }
}

/// Replays caller-computed extents, clipped to the polygon's clip rectangle.
struct ExtentsWalk<'a> {
    extents: &'a [Extent],
    start: i32,
    clip: ClipRect,
    rows: Range<i32>,
}

impl<'a> ExtentsWalk<'a> {
    fn new(start: i32, extents: &'a [Extent], clip: ClipRect) -> Option<Self> {
        let len = i32::try_from(extents.len()).ok()?;
        let bottom = start.saturating_add(len);
        let first = start.max(clip.min_y);
        let end = bottom.min(clip.max_y.saturating_add(1));
        if first >= end {
            return None;
        }

        let visible = &extents[(first - start) as usize..(end - start) as usize];
        let reaches_clip = visible.iter().any(|e| {
            let (lo, hi) = (e.startx.min(e.stopx), e.startx.max(e.stopx));
            hi > clip.min_x && lo <= clip.max_x
        });
        reaches_clip.then(|| Self {
            extents,
            start,
            clip,
            rows: first..end,
        })
    }
}

impl ScanlineWalk for ExtentsWalk<'_> {
    fn rows(&self) -> Range<i32> {
        self.rows.clone()
    }

    fn fill(&mut self, y: i32, extent: &mut Extent) -> u32 {
        let src = &self.extents[(y - self.start) as usize];
        let (mut istart, mut istop) = (src.startx, src.stopx);
        if istart > istop {
            std::mem::swap(&mut istart, &mut istop);
        }

        extent.params = src.params;
        if istart < self.clip.min_x {
            let shift = (self.clip.min_x - istart) as f32;
            for param in &mut extent.params {
                param.start += shift * param.dpdx;
            }
        }
        store_span(extent, istart, istop, self.clip)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/setup.rs"]
mod tests;
