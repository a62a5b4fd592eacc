//! Position builders for pixels, tubes, packs and panels.
//!
//! Every function returns positions in index order; that order is the order
//! in which pixel ids get assigned later, so callers must never reorder them.

/// Placement of one element relative to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Rotation of the element about the Y axis, in degrees
    pub rot_y: Option<f64>,
}

/// Lateral offsets of `n` elements of size `width` separated by `gap`.
///
/// Centered on zero and descending: the first element sits at the positive end.
pub fn flat_offsets(n: usize, width: f64, gap: f64) -> Vec<f64> {
    let effective_width = width + gap;
    let start = (effective_width / 2.0) * (n as f64 - 1.0);
    (0..n)
        .map(|i| start - (i as f64) * effective_width)
        .collect()
}

/// Offsets of `n` tubes in a pack, ascending from the negative end.
///
/// Passing negative `tube_width` and `air_gap` flips the ordering.
pub fn n_pack_offsets(n: usize, tube_width: f64, air_gap: f64) -> Vec<f64> {
    let effective_width = tube_width + air_gap;
    let start = (effective_width / 2.0) * (1.0 - n as f64);
    (0..n)
        .map(|i| start + (i as f64) * effective_width)
        .collect()
}

/// Angular positions, in degrees, of `n` elements spaced by `dtheta` and centered on `theta_0`
pub fn curved_angles(n: usize, dtheta: f64, theta_0: f64) -> Vec<f64> {
    let half_span = (n as f64) * dtheta / 2.0;
    (0..n)
        .map(|i| dtheta * (0.5 + i as f64) - half_span + theta_0)
        .collect()
}

/// Elements on an arc of `radius` around the focal point, each facing it.
///
/// Angles are measured from the Z axis towards the X axis. The element's own
/// rotation about Y equals its angular position.
pub fn curved_positions(
    n: usize,
    radius: f64,
    dtheta: f64,
    theta_0: f64,
    translation: [f64; 3],
    name_elem: &str,
    first_index: usize,
) -> Vec<Position> {
    curved_angles(n, dtheta, theta_0)
        .into_iter()
        .enumerate()
        .map(|(i, theta)| {
            let (sin, cos) = theta.to_radians().sin_cos();
            Position {
                name: format!("{name_elem}{}", first_index + i),
                x: radius * sin + translation[0],
                y: translation[1],
                z: radius * cos + translation[2],
                rot_y: Some(theta),
            }
        })
        .collect()
}

/// Elements of a flat panel laid out along X
pub fn flat_positions(
    n: usize,
    width: f64,
    gap: f64,
    name_elem: &str,
    first_index: usize,
) -> Vec<Position> {
    flat_offsets(n, width, gap)
        .into_iter()
        .enumerate()
        .map(|(i, x)| Position {
            name: format!("{name_elem}{}", first_index + i),
            x,
            y: 0.0,
            z: 0.0,
            rot_y: None,
        })
        .collect()
}

/// Front and back copies of a pack, shifted by half the separation along Z
/// and half the slip along X
pub fn double_pack_positions(pack_type: &str, separation: f64, slip: f64) -> [Position; 2] {
    let start_z = -separation / 2.0;
    let start_x = -slip / 2.0;
    let make = |i: usize, prefix: &str| Position {
        name: format!("{prefix}-{pack_type}"),
        x: start_x + slip * i as f64,
        y: 0.0,
        z: start_z + separation * i as f64,
        rot_y: None,
    };
    [make(0, "front"), make(1, "back")]
}

/// Pixel centers along a tube of `height` divided into `n` pixels
pub fn tube_pixel_offsets(n: usize, height: f64) -> Vec<f64> {
    let pixel_height = height / n as f64;
    let start = -height / 2.0 + pixel_height / 2.0;
    (0..n).map(|i| start + pixel_height * i as f64).collect()
}

/// `n` evenly spaced points from `start` to `stop`, both included
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
