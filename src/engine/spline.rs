// Path geometry helpers shared by waypoints and the manager.
//
// Convention: right-handed, +Y up, forward is -Z. A look rotation turns the
// local -Z axis onto the requested direction; yaw 0 faces -Z.

use glam::{EulerRot, Mat3, Quat, Vec3};

/// Directions shorter than this are treated as degenerate.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// Uniform Catmull-Rom through `p1` (t = 0) and `p2` (t = 1).
/// `p0` and `p3` only shape the tangents at the ends.
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Orientation whose forward (-Z) axis points along `direction`, using +Y as up.
/// Degenerate directions give the identity.
pub fn look_rotation(direction: Vec3) -> Quat {
    if direction.length() <= DIRECTION_EPSILON {
        return Quat::IDENTITY;
    }
    let z_axis = (-direction).normalize();
    let mut x_axis = Vec3::Y.cross(z_axis);
    if x_axis.length_squared() < 1e-8 {
        // Looking straight up or down.
        x_axis = Vec3::X;
    }
    let x_axis = x_axis.normalize();
    let y_axis = z_axis.cross(x_axis).normalize();
    Quat::from_mat3(&Mat3::from_cols(x_axis, y_axis, z_axis))
}

/// Heading of an orientation about +Y, in degrees.
#[inline]
pub fn yaw_degrees(rotation: Quat) -> f32 {
    rotation.to_euler(EulerRot::YXZ).0.to_degrees()
}

/// Heading of `direction` in degrees (0 when degenerate).
pub fn heading_degrees(direction: Vec3) -> f32 {
    if direction.length() <= DIRECTION_EPSILON {
        return 0.0;
    }
    yaw_degrees(look_rotation(direction))
}

/// Wraps an angle into (-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Planar distance and heading (degrees) from `source` to `target`.
///
/// The target is projected onto the horizontal plane through `source`
/// before measuring distance.
pub fn relative_offsets(source: Vec3, target: Vec3) -> (f32, f32) {
    let planar_target = Vec3::new(target.x, source.y, target.z);
    let distance = source.distance(planar_target);
    let angle = heading_degrees(target - source);
    (distance, angle)
}
