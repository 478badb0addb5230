use crate::foundation::core::{MAX_VERTEX_PARAMS, Vertex};

/// Determinant magnitude below which a triangle is treated as zero-area.
pub(crate) const DEGENERATE_EPSILON: f32 = 0.00001;

/// Round to the nearest integer, sending exact `.5` ties down.
///
/// `2.5 -> 2`, `2.51 -> 3`, `-0.5 -> -1`. Out-of-range inputs saturate and NaN maps to 0.
pub(crate) fn round_coordinate(value: f32) -> i32 {
    let floor = value.floor();
    let result = floor as i32;
    if value - floor > 0.5 {
        result.saturating_add(1)
    } else {
        result
    }
}

/// Horizontal change per scanline along the edge `a -> b`; zero for horizontal edges.
pub(crate) fn edge_dxdy(a: &Vertex, b: &Vertex) -> f32 {
    if b.y == a.y {
        0.0
    } else {
        (b.x - a.x) / (b.y - a.y)
    }
}

/// Per-parameter plane `p(x, y) = start + x * dpdx + y * dpdy` through three vertices.
#[derive(Clone, Debug)]
pub(crate) struct ParamPlane {
    pub(crate) start: [f32; MAX_VERTEX_PARAMS],
    pub(crate) dpdx: [f32; MAX_VERTEX_PARAMS],
    pub(crate) dpdy: [f32; MAX_VERTEX_PARAMS],
    pub(crate) degenerate: bool,
}

impl ParamPlane {
    /// Solve the 3x3 system mapping `(x, y, 1)` of each vertex to its parameter values.
    ///
    /// Uses the cofactor expansion directly. When the determinant is below
    /// [`DEGENERATE_EPSILON`] every parameter is held at `v1`'s value with zero gradients.
    pub(crate) fn solve(v1: &Vertex, v2: &Vertex, v3: &Vertex, count: usize) -> Self {
        let count = count.min(MAX_VERTEX_PARAMS);
        let mut plane = Self {
            start: [0.0; MAX_VERTEX_PARAMS],
            dpdx: [0.0; MAX_VERTEX_PARAMS],
            dpdy: [0.0; MAX_VERTEX_PARAMS],
            degenerate: false,
        };

        let a00 = v2.y - v3.y;
        let a01 = v3.x - v2.x;
        let a02 = v2.x * v3.y - v3.x * v2.y;
        let a10 = v3.y - v1.y;
        let a11 = v1.x - v3.x;
        let a12 = v3.x * v1.y - v1.x * v3.y;
        let a20 = v1.y - v2.y;
        let a21 = v2.x - v1.x;
        let a22 = v1.x * v2.y - v2.x * v1.y;
        let det = a02 + a12 + a22;

        if det.abs() < DEGENERATE_EPSILON {
            plane.degenerate = true;
            plane.start[..count].copy_from_slice(&v1.params[..count]);
            return plane;
        }

        let idet = 1.0 / det;
        for i in 0..count {
            let (p1, p2, p3) = (v1.params[i], v2.params[i], v3.params[i]);
            plane.dpdx[i] = idet * (p1 * a00 + p2 * a10 + p3 * a20);
            plane.dpdy[i] = idet * (p1 * a01 + p2 * a11 + p3 * a21);
            plane.start[i] = idet * (p1 * a02 + p2 * a12 + p3 * a22);
        }
        plane
    }

    pub(crate) fn eval(&self, index: usize, x: f32, y: f32) -> f32 {
        self.start[index] + x * self.dpdx[index] + y * self.dpdy[index]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
