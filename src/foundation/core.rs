/// Maximum number of interpolated parameters carried per vertex.
pub const MAX_VERTEX_PARAMS: usize = 32;

/// Maximum number of vertices accepted by a single polygon submission.
pub const MAX_POLYGON_VERTICES: usize = 32;

/// Maximum number of scanline extents carried by one extents submission; longer runs are split.
pub const MAX_EXTENTS_PER_CHUNK: usize = 64;

/// Scanlines covered by one ordering bucket.
pub const SCANLINES_PER_BUCKET: usize = 8;

/// Default addressable frame height in scanlines.
pub const DEFAULT_FRAME_HEIGHT: i32 = 512;

/// Default addressable frame width in pixels.
pub const DEFAULT_FRAME_WIDTH: i32 = 1024;

/// Screen-space vertex with interpolated parameters.
///
/// Only the first `param_count` entries of `params` are read, where `param_count` is passed
/// alongside the vertices at submission time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vertex {
    /// Horizontal position in pixels.
    pub x: f32,
    /// Vertical position in scanlines.
    pub y: f32,
    /// Parameter values at this vertex.
    pub params: [f32; MAX_VERTEX_PARAMS],
}

impl Vertex {
    /// Vertex without parameters.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            params: [0.0; MAX_VERTEX_PARAMS],
        }
    }

    /// Vertex whose leading parameters are copied from `params`.
    ///
    /// Values beyond [`MAX_VERTEX_PARAMS`] are ignored.
    pub fn with_params(x: f32, y: f32, params: &[f32]) -> Self {
        let mut v = Self::new(x, y);
        let n = params.len().min(MAX_VERTEX_PARAMS);
        v.params[..n].copy_from_slice(&params[..n]);
        v
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Axis-aligned clip rectangle with inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClipRect {
    /// Leftmost visible column.
    pub min_x: i32,
    /// Topmost visible scanline.
    pub min_y: i32,
    /// Rightmost visible column (inclusive).
    pub max_x: i32,
    /// Bottom visible scanline (inclusive).
    pub max_y: i32,
}

impl ClipRect {
    /// Construct from inclusive bounds.
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle covering a `width x height` frame anchored at the origin.
    pub fn frame(width: i32, height: i32) -> Self {
        Self::new(0, 0, width - 1, height - 1)
    }

    /// Overlap of two rectangles. The result may be empty.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        }
    }

    /// Return `true` when the rectangle covers no pixel.
    pub fn is_empty(self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// Number of covered columns.
    pub fn width(self) -> i32 {
        (self.max_x - self.min_x + 1).max(0)
    }

    /// Number of covered scanlines.
    pub fn height(self) -> i32 {
        (self.max_y - self.min_y + 1).max(0)
    }

    /// Return `true` when pixel `(x, y)` lies inside.
    pub fn contains(self, x: i32, y: i32) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }
}

/// Start value and per-pixel gradient of one parameter along an extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExtentParam {
    /// Value at the centre of the extent's first pixel.
    pub start: f32,
    /// Change per pixel step to the right.
    pub dpdx: f32,
}

/// Horizontal span `[startx, stopx)` on one scanline plus its parameter setup.
///
/// `startx == stopx` marks an empty span; the parameters are still filled in.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    /// First covered column.
    pub startx: i32,
    /// One past the last covered column.
    pub stopx: i32,
    /// Per-parameter start values and gradients.
    pub params: [ExtentParam; MAX_VERTEX_PARAMS],
}

impl Extent {
    /// Span without parameter data.
    pub fn span(startx: i32, stopx: i32) -> Self {
        Self {
            startx,
            stopx,
            ..Self::default()
        }
    }

    /// Number of covered pixels.
    pub fn len(&self) -> u32 {
        self.stopx.saturating_sub(self.startx).max(0) as u32
    }

    /// Return `true` when no pixel is covered.
    pub fn is_empty(&self) -> bool {
        self.stopx <= self.startx
    }

    /// Value of parameter `index` at the centre of column `x`.
    pub fn param_at(&self, index: usize, x: i32) -> f32 {
        let p = self.params[index];
        p.start + (x - self.startx) as f32 * p.dpdx
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
