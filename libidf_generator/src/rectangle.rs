//! Rigid-body placement of a bank from four surveyed corners.
//!
//! Corners are given lower-left first, then clockwise when looking at the
//! detector face: LL, UL, UR, LR. The canonical frame has X pointing from
//! the left to the right edge, Y from the bottom to the top edge and Z along
//! the face normal.
use nalgebra::{Matrix3, Vector3};

use super::error::GeometryError;
use super::geometry::Document;
use super::xml_tree::{float_attr, NodeId};

/// Default absolute tolerance, in metres, on the rectangle checks
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
const GIMBAL_EPSILON: f64 = 1e-9;

pub type Vector = Vector3<f64>;

#[derive(Debug, Clone)]
pub struct Rectangle {
    corners: [Vector; 4],
    center: Vector,
    orientation: Matrix3<f64>,
    width: f64,
    height: f64,
}

fn check_close(side: &'static str, a: f64, b: f64, tolerance: f64) -> Result<(), GeometryError> {
    let delta = (a - b).abs();
    if delta > tolerance {
        Err(GeometryError::NotRectangle {
            side,
            delta,
            tolerance,
        })
    } else {
        Ok(())
    }
}

impl Rectangle {
    /// Build the rectangle, failing if the corners deviate from a planar
    /// rectangle by more than `tolerance`
    pub fn new(
        lower_left: Vector,
        upper_left: Vector,
        upper_right: Vector,
        lower_right: Vector,
        tolerance: f64,
    ) -> Result<Self, GeometryError> {
        let (p1, p2, p3, p4) = (lower_left, upper_left, upper_right, lower_right);
        let left = (p2 - p1).norm();
        let right = (p3 - p4).norm();
        let bottom = (p4 - p1).norm();
        let top = (p3 - p2).norm();
        if left <= f64::EPSILON {
            return Err(GeometryError::Degenerate("left"));
        }
        if bottom <= f64::EPSILON {
            return Err(GeometryError::Degenerate("bottom"));
        }
        check_close("left and right sides", left, right, tolerance)?;
        check_close("top and bottom sides", top, bottom, tolerance)?;
        check_close(
            "diagonals",
            (p3 - p1).norm(),
            (p4 - p2).norm(),
            tolerance,
        )?;

        let normal = (p4 - p1).cross(&(p2 - p1)).normalize();
        check_close(
            "upper-right corner and face plane",
            (p3 - p1).dot(&normal),
            0.0,
            tolerance,
        )?;

        // average opposite sides so that both edges contribute to the axes
        let x_axis = ((p4 - p1) + (p3 - p2)).normalize();
        let y_raw = (p2 - p1) + (p3 - p4);
        let z_axis = x_axis.cross(&y_raw).normalize();
        let y_axis = z_axis.cross(&x_axis);

        Ok(Self {
            corners: [p1, p2, p3, p4],
            center: (p1 + p2 + p3 + p4) / 4.0,
            orientation: Matrix3::from_columns(&[x_axis, y_axis, z_axis]),
            width: 0.5 * (top + bottom),
            height: 0.5 * (left + right),
        })
    }

    pub fn corners(&self) -> &[Vector; 4] {
        &self.corners
    }

    pub fn center(&self) -> Vector {
        self.center
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Rotation taking the canonical frame onto the measured one; columns are the measured axes
    pub fn orientation(&self) -> &Matrix3<f64> {
        &self.orientation
    }

    /// Euler angles `(alpha, beta, gamma)` in degrees with `R = Ry(alpha) Rz(beta) Ry(gamma)`
    pub fn euler_rot_yzy(&self) -> [f64; 3] {
        let r = &self.orientation;
        let cos_beta = r[(1, 1)].clamp(-1.0, 1.0);
        let beta = cos_beta.acos();
        let (alpha, gamma) = if beta.sin().abs() > GIMBAL_EPSILON {
            (r[(2, 1)].atan2(-r[(0, 1)]), r[(1, 2)].atan2(r[(1, 0)]))
        } else if cos_beta > 0.0 {
            // beta == 0, only alpha + gamma is defined
            (r[(0, 2)].atan2(r[(0, 0)]), 0.0)
        } else {
            // beta == 180, only alpha - gamma is defined
            (r[(0, 2)].atan2(-r[(0, 0)]), 0.0)
        };
        [alpha.to_degrees(), beta.to_degrees(), gamma.to_degrees()]
    }
}

/// Place component at the rectangle center, rotated onto the measured face.
///
/// The rotations are nested innermost-last in reverse YZY order.
pub fn add_rectangle_location(doc: &mut Document, component: NodeId, rect: &Rectangle) -> NodeId {
    let center = rect.center();
    let location = doc
        .tree_mut()
        .append(component, "location")
        .attr("x", float_attr(center.x))
        .attr("y", float_attr(center.y))
        .attr("z", float_attr(center.z))
        .id();
    let [alpha, beta, gamma] = rect.euler_rot_yzy();
    let mut parent = location;
    for (angle, axis) in [(gamma, [0, 1, 0]), (beta, [0, 0, 1]), (alpha, [0, 1, 0])] {
        parent = doc
            .tree_mut()
            .append(parent, "rot")
            .attr("val", float_attr(angle))
            .attr("axis-x", axis[0].to_string())
            .attr("axis-y", axis[1].to_string())
            .attr("axis-z", axis[2].to_string())
            .id();
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn canonical(width: f64, height: f64) -> [Vector; 4] {
        let (w, h) = (width / 2.0, height / 2.0);
        [
            Vector::new(-w, -h, 0.0),
            Vector::new(-w, h, 0.0),
            Vector::new(w, h, 0.0),
            Vector::new(w, -h, 0.0),
        ]
    }

    fn rect_from(corners: [Vector; 4], tolerance: f64) -> Result<Rectangle, GeometryError> {
        Rectangle::new(corners[0], corners[1], corners[2], corners[3], tolerance)
    }

    #[test]
    fn test_axis_aligned_is_identity() {
        let offset = Vector::new(1.0, -2.0, 3.5);
        let corners = canonical(0.8, 1.0).map(|c| c + offset);
        let rect = rect_from(corners, DEFAULT_TOLERANCE).unwrap();
        for angle in rect.euler_rot_yzy() {
            assert!(angle.abs() < 1e-9);
        }
        let mean = corners.iter().sum::<Vector>() / 4.0;
        assert!((rect.center() - mean).norm() < 1e-12);
        assert!((rect.width() - 0.8).abs() < 1e-12);
        assert!((rect.height() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_recovers_yzy_angles() {
        let (a, b, c) = (30.0f64, 40.0f64, 50.0f64);
        let rotation = Rotation3::from_axis_angle(&Vector::y_axis(), a.to_radians())
            * Rotation3::from_axis_angle(&Vector::z_axis(), b.to_radians())
            * Rotation3::from_axis_angle(&Vector::y_axis(), c.to_radians());
        let offset = Vector::new(-1.2, 0.3, 2.0);
        let corners = canonical(0.5, 1.0).map(|p| rotation * p + offset);
        let rect = rect_from(corners, DEFAULT_TOLERANCE).unwrap();
        let [alpha, beta, gamma] = rect.euler_rot_yzy();
        assert!((alpha - a).abs() < 1e-6, "alpha {alpha}");
        assert!((beta - b).abs() < 1e-6, "beta {beta}");
        assert!((gamma - c).abs() < 1e-6, "gamma {gamma}");
        assert!((rect.center() - offset).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_about_y_only() {
        let rotation = Rotation3::from_axis_angle(&Vector::y_axis(), 120f64.to_radians());
        let corners = canonical(0.5, 1.0).map(|p| rotation * p);
        let rect = rect_from(corners, DEFAULT_TOLERANCE).unwrap();
        let [alpha, beta, gamma] = rect.euler_rot_yzy();
        assert!(beta.abs() < 1e-6);
        assert!((alpha + gamma - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_skewed_corners_rejected() {
        let mut corners = canonical(0.8, 1.0);
        corners[2].x += 0.01;
        match rect_from(corners, DEFAULT_TOLERANCE) {
            Err(GeometryError::NotRectangle { .. }) => (),
            other => panic!("expected NotRectangle, got {other:?}"),
        }
        // the same points pass with a generous tolerance
        assert!(rect_from(corners, 0.035).is_ok());
    }

    #[test]
    fn test_non_planar_rejected() {
        let mut corners = canonical(1.0, 1.0);
        corners[0].z += 0.01;
        corners[2].z += 0.01;
        corners[1].z -= 0.01;
        corners[3].z -= 0.01;
        assert!(rect_from(corners, DEFAULT_TOLERANCE).is_err());
    }

    #[test]
    fn test_degenerate_rejected() {
        let p = Vector::new(0.0, 0.0, 0.0);
        assert!(matches!(
            Rectangle::new(p, p, p, p, DEFAULT_TOLERANCE),
            Err(GeometryError::Degenerate(_))
        ));
    }
}
