use super::*;

#[test]
fn round_coordinate_sends_ties_down() {
    assert_eq!(round_coordinate(2.5), 2);
    assert_eq!(round_coordinate(2.500_1), 3);
    assert_eq!(round_coordinate(2.49), 2);
    assert_eq!(round_coordinate(0.0), 0);
    assert_eq!(round_coordinate(-0.5), -1);
    assert_eq!(round_coordinate(-0.4), 0);
    assert_eq!(round_coordinate(9.5), 9);
}

#[test]
fn round_coordinate_saturates() {
    assert_eq!(round_coordinate(f32::MAX), i32::MAX);
    assert_eq!(round_coordinate(f32::MIN), i32::MIN);
    assert_eq!(round_coordinate(f32::NAN), 0);
}

#[test]
fn edge_slope_of_horizontal_edge_is_zero() {
    let a = Vertex::new(0.0, 3.0);
    let b = Vertex::new(10.0, 3.0);
    assert_eq!(edge_dxdy(&a, &b), 0.0);
    let c = Vertex::new(5.0, 8.0);
    assert_eq!(edge_dxdy(&a, &c), 1.0);
}

#[test]
fn plane_reproduces_vertex_values() {
    let v1 = Vertex::with_params(3.0, 1.0, &[1.0, -4.0]);
    let v2 = Vertex::with_params(17.5, 6.0, &[9.0, 2.0]);
    let v3 = Vertex::with_params(6.0, 22.0, &[-3.0, 12.5]);
    let plane = ParamPlane::solve(&v1, &v2, &v3, 2);
    assert!(!plane.degenerate);

    for v in [&v1, &v2, &v3] {
        for i in 0..2 {
            let got = plane.eval(i, v.x, v.y);
            assert!(
                (got - v.params[i]).abs() < 1e-3,
                "param {i} at ({}, {}): {got} != {}",
                v.x,
                v.y,
                v.params[i]
            );
        }
    }
}

#[test]
fn plane_falls_back_to_first_vertex_when_collinear() {
    let v1 = Vertex::with_params(0.0, 0.0, &[7.0]);
    let v2 = Vertex::with_params(5.0, 5.0, &[1.0]);
    let v3 = Vertex::with_params(10.0, 10.0, &[100.0]);
    let plane = ParamPlane::solve(&v1, &v2, &v3, 1);
    assert!(plane.degenerate);
    assert_eq!(plane.start[0], 7.0);
    assert_eq!(plane.dpdx[0], 0.0);
    assert_eq!(plane.dpdy[0], 0.0);
    assert_eq!(plane.eval(0, 42.0, -3.0), 7.0);
}
