// Waypoints ("points of interest") and the segment each one owns.
//
// A waypoint stores its authored parameters plus data derived for the
// segment leading to its successor: the resolved look target, orientation
// endpoints, and an arc-length resampled polyline used for constant-speed
// playback. Neighbours are addressed by index into the manager's list.

use glam::{Quat, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::config::{RawTag, deserialize_quat, deserialize_vec3};
use super::easing::EasingType;
use super::error::{FlythroughError, FlythroughResult};
use super::manager::PlaybackMode;
use super::spline::{
    DIRECTION_EPSILON, catmull_rom, heading_degrees, look_rotation, relative_offsets,
    wrap_degrees,
};

// ============================================================================
// TUNING
// ============================================================================

/// Target resampled steps per world unit.
pub const STEPS_PER_METER: f32 = 3.0;
/// Raw spline measurements taken per resampled step.
pub const MEASUREMENTS_PER_STEP: f32 = 20.0;
/// Segments shorter than this get a denser step grid.
pub const SHORT_SEGMENT_LENGTH: f32 = 2.0;
/// Step density multiplier applied to short segments.
pub const SHORT_SEGMENT_DENSITY: f32 = 3.0;
/// Spline progress sampled to find the tangent look target.
pub const LOOK_AHEAD_PROGRESS: f32 = 0.005;

/// Lower bound on the speed used for auto-roll scaling.
const AUTO_ROLL_MIN_SPEED: f32 = 0.01;
/// Yaw change (degrees) that produces the full roll angle.
const AUTO_ROLL_FULL_TURN: f32 = 90.0;

/// Empirically tuned constants for segment measurement and look-ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTuning {
    pub steps_per_meter: f32,
    pub measurements_per_step: f32,
    pub short_segment_length: f32,
    pub short_segment_density: f32,
    pub look_ahead_progress: f32,
}

impl Default for PathTuning {
    fn default() -> Self {
        Self {
            steps_per_meter: STEPS_PER_METER,
            measurements_per_step: MEASUREMENTS_PER_STEP,
            short_segment_length: SHORT_SEGMENT_LENGTH,
            short_segment_density: SHORT_SEGMENT_DENSITY,
            look_ahead_progress: LOOK_AHEAD_PROGRESS,
        }
    }
}

/// Manager-wide parameters a waypoint needs while deriving its segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathContext {
    pub mode: PlaybackMode,
    pub auto_roll_max_speed: f32,
    pub auto_roll_max_angle: f32,
    pub tuning: PathTuning,
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Where a waypoint looks while the camera leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTag")]
pub enum LookAtMode {
    /// Look a short distance ahead along the path.
    #[default]
    PathTangent = 0,
    /// Look at the authored target point.
    FixedTarget = 1,
}

impl FromStr for LookAtMode {
    type Err = FlythroughError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "pathtangent" | "path" => Ok(LookAtMode::PathTangent),
            "fixedtarget" | "target" => Ok(LookAtMode::FixedTarget),
            _ => Err(FlythroughError::UnknownLookAt(s.to_string())),
        }
    }
}

impl TryFrom<RawTag> for LookAtMode {
    type Error = FlythroughError;

    fn try_from(tag: RawTag) -> Result<Self, Self::Error> {
        match tag {
            RawTag::Index(0) => Ok(LookAtMode::PathTangent),
            RawTag::Index(1) => Ok(LookAtMode::FixedTarget),
            RawTag::Index(i) => Err(FlythroughError::UnknownLookAt(i.to_string())),
            RawTag::Name(name) => name.parse(),
        }
    }
}

/// Authored waypoint parameters, as read from a tour file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointDescriptor {
    #[serde(default, alias = "lType")]
    pub look_at: LookAtMode,

    /// Output of initialisation for tangent look-at; kept for authoring tools.
    #[serde(default, alias = "lAngle")]
    pub look_angle: f32,

    #[serde(default, alias = "lDistance")]
    pub look_distance: f32,

    #[serde(default, alias = "lLocation", deserialize_with = "deserialize_vec3")]
    pub look_target: Vec3,

    /// Speed in world units per second when leaving this waypoint.
    #[serde(default, alias = "startSpeed")]
    pub start_speed: f32,

    #[serde(default, alias = "velocityEType")]
    pub velocity_easing: EasingType,

    #[serde(default, alias = "rotationEType")]
    pub rotation_easing: EasingType,

    #[serde(default, alias = "positionEType")]
    pub position_easing: EasingType,

    /// Placeholder only; overwritten when the segment is measured.
    #[serde(default, alias = "segmentDist")]
    pub segment_distance: f32,

    #[serde(deserialize_with = "deserialize_vec3")]
    pub position: Vec3,

    #[serde(default, deserialize_with = "deserialize_quat")]
    pub rotation: Quat,

    #[serde(default, alias = "autoRoll", alias = "autoRollOn")]
    pub auto_roll: bool,
}

impl WaypointDescriptor {
    /// Tangent-looking waypoint at `position` with every other field defaulted.
    pub fn at(position: Vec3) -> Self {
        Self {
            look_at: LookAtMode::PathTangent,
            look_angle: 0.0,
            look_distance: 0.0,
            look_target: Vec3::ZERO,
            start_speed: 0.0,
            velocity_easing: EasingType::Linear,
            rotation_easing: EasingType::Linear,
            position_easing: EasingType::Linear,
            segment_distance: 0.0,
            position,
            rotation: Quat::IDENTITY,
            auto_roll: false,
        }
    }

    pub fn with_speed(mut self, start_speed: f32) -> Self {
        self.start_speed = start_speed;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.look_at = LookAtMode::FixedTarget;
        self.look_target = target;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_easing(
        mut self,
        velocity: EasingType,
        rotation: EasingType,
        position: EasingType,
    ) -> Self {
        self.velocity_easing = velocity;
        self.rotation_easing = rotation;
        self.position_easing = position;
        self
    }

    pub fn with_auto_roll(mut self, enabled: bool) -> Self {
        self.auto_roll = enabled;
        self
    }

    /// Rejects non-finite numbers, negative speeds and zero quaternions.
    pub fn validate(&self, index: usize) -> FlythroughResult<()> {
        let scalars = [
            ("look_angle", self.look_angle),
            ("look_distance", self.look_distance),
            ("start_speed", self.start_speed),
            ("segment_distance", self.segment_distance),
        ];
        for (field, value) in scalars {
            if !value.is_finite() {
                return Err(FlythroughError::NonFinite { index, field });
            }
        }
        if !self.position.is_finite() {
            return Err(FlythroughError::NonFinite { index, field: "position" });
        }
        if !self.look_target.is_finite() {
            return Err(FlythroughError::NonFinite { index, field: "look_target" });
        }
        if !self.rotation.is_finite() {
            return Err(FlythroughError::NonFinite { index, field: "rotation" });
        }
        if self.start_speed < 0.0 {
            return Err(FlythroughError::InvalidValue {
                index,
                field: "start_speed",
                reason: format!("must not be negative (got {})", self.start_speed),
            });
        }
        if self.rotation.length_squared() < 1e-12 {
            return Err(FlythroughError::InvalidValue {
                index,
                field: "rotation",
                reason: "is a zero-length quaternion".into(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// WAYPOINT
// ============================================================================

/// Position, rotation and speed sampled along a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: f32,
}

#[derive(Debug, Clone)]
pub struct Waypoint {
    index: usize,

    position: Vec3,
    authored_rotation: Quat,
    /// Authored rotation, or the auto-roll bank when that applies.
    rotation: Quat,
    start_speed: f32,

    look_at: LookAtMode,
    look_target: Vec3,
    look_angle: f32,
    look_distance: f32,

    velocity_easing: EasingType,
    rotation_easing: EasingType,
    position_easing: EasingType,
    auto_roll: bool,

    prev: Option<usize>,
    next: Option<usize>,
    is_first: bool,
    is_last: bool,

    segment_length: f32,
    path: Vec<Vec3>,
    rotation_start: Quat,
    rotation_end: Quat,
}

/// Everything `initialise` recomputes, gathered before it is written back.
#[derive(Debug, Clone)]
pub(crate) struct Derived {
    look_target: Vec3,
    look_angle: f32,
    look_distance: f32,
    rotation: Quat,
    rotation_start: Quat,
    rotation_end: Quat,
    segment: Option<(f32, Vec<Vec3>)>,
}

impl Waypoint {
    pub fn new(index: usize, descriptor: &WaypointDescriptor) -> Self {
        let rotation = descriptor.rotation.normalize();
        Self {
            index,
            position: descriptor.position,
            authored_rotation: rotation,
            rotation,
            start_speed: descriptor.start_speed,
            look_at: descriptor.look_at,
            look_target: descriptor.look_target,
            look_angle: descriptor.look_angle,
            look_distance: descriptor.look_distance,
            velocity_easing: descriptor.velocity_easing,
            rotation_easing: descriptor.rotation_easing,
            position_easing: descriptor.position_easing,
            auto_roll: descriptor.auto_roll,
            prev: None,
            next: None,
            is_first: false,
            is_last: false,
            segment_length: descriptor.segment_distance.max(0.0),
            path: Vec::new(),
            rotation_start: Quat::IDENTITY,
            rotation_end: Quat::IDENTITY,
        }
    }

    pub(crate) fn link(
        &mut self,
        index: usize,
        prev: usize,
        next: usize,
        is_first: bool,
        is_last: bool,
    ) {
        self.index = index;
        self.prev = Some(prev);
        self.next = Some(next);
        self.is_first = is_first;
        self.is_last = is_last;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn start_speed(&self) -> f32 {
        self.start_speed
    }

    pub fn look_at(&self) -> LookAtMode {
        self.look_at
    }

    pub fn look_target(&self) -> Vec3 {
        self.look_target
    }

    pub fn look_angle(&self) -> f32 {
        self.look_angle
    }

    pub fn look_distance(&self) -> f32 {
        self.look_distance
    }

    pub fn prev(&self) -> Option<usize> {
        self.prev
    }

    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub fn is_first(&self) -> bool {
        self.is_first
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    pub fn path(&self) -> &[Vec3] {
        &self.path
    }

    pub fn rotation_start(&self) -> Quat {
        self.rotation_start
    }

    pub fn rotation_end(&self) -> Quat {
        self.rotation_end
    }

    /// Point on the outgoing Catmull-Rom segment at progress `t`.
    pub fn spline_position(&self, t: f32, path: &[Waypoint]) -> Vec3 {
        let next = self.next.unwrap_or(self.index);
        let prev = self.prev.unwrap_or(self.index);
        let after_next = path[next].next.unwrap_or(next);
        catmull_rom(
            path[prev].position,
            self.position,
            path[next].position,
            path[after_next].position,
            t,
        )
    }

    /// Recomputes look target, orientation endpoints and, when
    /// `compute_segments` is set, the resampled segment.
    /// Unlinked waypoints are left untouched.
    pub(crate) fn derive(
        &self,
        path: &[Waypoint],
        ctx: &PathContext,
        compute_segments: bool,
    ) -> Option<Derived> {
        let (prev, next) = match (self.prev, self.next) {
            (None, None) => return None,
            (prev, next) => (prev.unwrap_or(self.index), next.unwrap_or(self.index)),
        };

        let look_target = match self.look_at {
            LookAtMode::PathTangent => self.spline_position(ctx.tuning.look_ahead_progress, path),
            LookAtMode::FixedTarget => self.look_target,
        };
        let (look_distance, angle) = relative_offsets(self.position, look_target);
        let look_angle = 360.0 + angle;

        let rolls = self.auto_roll
            && (ctx.mode == PlaybackMode::Looped || (!self.is_first && !self.is_last));
        let rotation = if rolls {
            self.bank_rotation(path[prev].position, path[next].position, ctx)
        } else {
            self.authored_rotation
        };

        let rotation_start = oriented(look_target - self.position, rotation);
        let successor = &path[next];
        let rotation_end = oriented(successor.look_target - successor.position, successor.rotation);

        let segment = compute_segments.then(|| self.measure_segment(path, ctx));

        Some(Derived {
            look_target,
            look_angle,
            look_distance,
            rotation,
            rotation_start,
            rotation_end,
            segment,
        })
    }

    pub(crate) fn apply(&mut self, derived: Derived) {
        self.look_target = derived.look_target;
        self.look_angle = derived.look_angle;
        self.look_distance = derived.look_distance;
        self.rotation = derived.rotation;
        self.rotation_start = derived.rotation_start;
        self.rotation_end = derived.rotation_end;
        if let Some((length, points)) = derived.segment {
            self.segment_length = length;
            self.path = points;
        }
    }

    /// Roll about the forward axis proportional to turn sharpness and speed.
    fn bank_rotation(&self, prev: Vec3, next: Vec3, ctx: &PathContext) -> Quat {
        let heading_in = heading_degrees(self.position - prev);
        let heading_out = heading_degrees(next - self.position);
        let yaw_delta = wrap_degrees(heading_out - heading_in);

        let max_speed = ctx.auto_roll_max_speed;
        let speed_ratio = self.start_speed.max(AUTO_ROLL_MIN_SPEED).min(max_speed) / max_speed;
        let angle_ratio = if yaw_delta < 0.0 {
            yaw_delta.max(-AUTO_ROLL_FULL_TURN) / AUTO_ROLL_FULL_TURN
        } else {
            yaw_delta.min(AUTO_ROLL_FULL_TURN) / AUTO_ROLL_FULL_TURN
        };

        let roll = -angle_ratio * speed_ratio * ctx.auto_roll_max_angle;
        Quat::from_axis_angle(Vec3::NEG_Z, roll.to_radians())
    }

    fn measure_segment(&self, path: &[Waypoint], ctx: &PathContext) -> (f32, Vec<Vec3>) {
        let terminal = ctx.mode == PlaybackMode::SingleShot && self.is_last;
        let Some(next) = self.next.filter(|_| !terminal) else {
            return (0.0, Vec::new());
        };

        let end = path[next].position;
        let (length, points) = resample_segment(
            self.position,
            end,
            |t| self.spline_position(t, path),
            &ctx.tuning,
        );
        debug!(
            "segment {} -> {}: length {:.3}, {} points",
            self.index,
            next,
            length,
            points.len()
        );
        (length, points)
    }

    /// Samples the segment at normalized progress `t`.
    pub fn calculate_progress(&self, t: f32, path: &[Waypoint]) -> Pose {
        let next = &path[self.next.unwrap_or(self.index)];

        let eased_velocity = self.velocity_easing.apply(t);
        let velocity = self.start_speed + (next.start_speed - self.start_speed) * eased_velocity;

        let rotation = self
            .rotation_start
            .slerp(self.rotation_end, self.rotation_easing.apply(t));

        Pose {
            position: self.position_at(t),
            rotation,
            velocity,
        }
    }

    /// Position on the resampled polyline at eased progress.
    pub fn position_at(&self, t: f32) -> Vec3 {
        let t = self.position_easing.apply(t).clamp(0.0, 1.0);
        match self.path.len() {
            0 => self.position,
            1 => self.path[0],
            count => {
                let spans = (count - 1) as f32;
                let scaled = t * spans;
                let i = scaled.floor() as usize;
                if i >= count - 1 {
                    return self.path[count - 1];
                }
                self.path[i].lerp(self.path[i + 1], scaled - i as f32)
            }
        }
    }
}

/// Look rotation toward `direction` composed with `base`, or `base` alone
/// when the direction is degenerate.
fn oriented(direction: Vec3, base: Quat) -> Quat {
    if direction.length() > DIRECTION_EPSILON {
        look_rotation(direction) * base
    } else {
        base
    }
}

// ============================================================================
// ARC-LENGTH RESAMPLING
// ============================================================================

/// Measures a curve from `start` to `end` and resamples it into points
/// spaced at a near-uniform arc length.
///
/// `curve` maps progress in [0, 1] to a position, with `curve(0) == start`
/// and `curve(1) == end`. The sampling resolution follows the straight-line
/// distance between the endpoints. Returns the measured length and the
/// points; the first point is `start` and the last is exactly `end`.
/// Coincident endpoints give a zero length and no points.
pub fn resample_segment(
    start: Vec3,
    end: Vec3,
    curve: impl Fn(f32) -> Vec3,
    tuning: &PathTuning,
) -> (f32, Vec<Vec3>) {
    let mut steps_per_meter = tuning.steps_per_meter;
    let measurements_per_meter = steps_per_meter * tuning.measurements_per_step;
    let straight = start.distance(end);
    let measurements = (measurements_per_meter * straight).ceil() as usize;
    if measurements == 0 {
        return (0.0, Vec::new());
    }

    let sample = |m: usize| curve(m as f32 / measurements as f32);

    // Measure.
    let mut length = 0.0;
    let mut prev = start;
    for m in 1..=measurements {
        let current = sample(m);
        length += prev.distance(current);
        prev = current;
    }
    if length <= 0.0 {
        return (0.0, Vec::new());
    }

    if length < tuning.short_segment_length {
        steps_per_meter *= tuning.short_segment_density;
    }
    let raw_step = 1.0 / steps_per_meter;
    let step = length / (length / raw_step).floor().max(1.0);

    // Resample.
    let mut points = vec![start];
    let mut last_emitted = start;
    let mut prev = start;
    let mut stepped = 0.0;
    let mut total_stepped = 0.0;
    for m in 1..=measurements {
        let current = sample(m);
        stepped += prev.distance(current);
        while stepped >= step {
            last_emitted = last_emitted.lerp(current, step / stepped);
            points.push(last_emitted);
            stepped -= step;
            total_stepped += step;
        }
        prev = current;
    }

    // Pin the final point to the exact endpoint.
    if (total_stepped - length) / step < -0.5 {
        points.push(end);
    } else if let Some(last) = points.last_mut() {
        *last = end;
    }

    (length, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::manager::link_waypoints;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn ctx(mode: PlaybackMode) -> PathContext {
        PathContext {
            mode,
            auto_roll_max_speed: 10.0,
            auto_roll_max_angle: 30.0,
            tuning: PathTuning::default(),
        }
    }

    fn build(descriptors: &[WaypointDescriptor], mode: PlaybackMode) -> Vec<Waypoint> {
        let mut path: Vec<Waypoint> = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| Waypoint::new(i, d))
            .collect();
        link_waypoints(&mut path, mode);
        let ctx = ctx(mode);
        for pass in [false, true] {
            for i in 0..path.len() {
                if let Some(derived) = path[i].derive(&path, &ctx, pass) {
                    path[i].apply(derived);
                }
            }
        }
        path
    }

    fn polyline_length(points: &[Vec3]) -> f32 {
        points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    fn square(side: f32, speed: f32) -> Vec<WaypointDescriptor> {
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(side, 0.0, 0.0),
            Vec3::new(side, 0.0, -side),
            Vec3::new(0.0, 0.0, -side),
        ]
        .into_iter()
        .map(|p| WaypointDescriptor::at(p).with_speed(speed))
        .collect()
    }

    #[test]
    fn resample_straight_line_is_uniform() {
        let start = Vec3::ZERO;
        let end = Vec3::new(10.0, 0.0, 0.0);
        let (length, points) =
            resample_segment(start, end, |t| start.lerp(end, t), &PathTuning::default());

        assert_relative_eq!(length, 10.0, epsilon = 1e-3);
        assert_eq!(points[0], start);
        assert_eq!(*points.last().unwrap(), end);
        // Roughly 3 steps per meter over 10 meters.
        assert!((30..=32).contains(&points.len()), "{} points", points.len());
        let step = points[0].distance(points[1]);
        assert_relative_eq!(step, 1.0 / 3.0, epsilon = 0.02);
        for w in points.windows(2) {
            assert_relative_eq!(w[0].distance(w[1]), step, epsilon = 1e-3);
        }
    }

    #[test]
    fn resample_short_segment_uses_denser_steps() {
        let end = Vec3::new(1.0, 0.0, 0.0);
        let (length, points) =
            resample_segment(Vec3::ZERO, end, |t| Vec3::ZERO.lerp(end, t), &PathTuning::default());
        assert_relative_eq!(length, 1.0, epsilon = 1e-4);
        // 9 steps per meter instead of 3.
        assert!((9..=11).contains(&points.len()), "{} points", points.len());
        assert_eq!(*points.last().unwrap(), end);
    }

    #[test]
    fn resample_tiny_segment_still_spans_endpoints() {
        let end = Vec3::new(0.05, 0.0, 0.0);
        let (length, points) =
            resample_segment(Vec3::ZERO, end, |t| Vec3::ZERO.lerp(end, t), &PathTuning::default());
        assert!(length > 0.0);
        assert!(points.len() >= 2);
        assert_eq!(points[0], Vec3::ZERO);
        assert_eq!(*points.last().unwrap(), end);
    }

    #[test]
    fn resample_coincident_endpoints_is_empty() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let (length, points) = resample_segment(p, p, |_| p, &PathTuning::default());
        assert_eq!(length, 0.0);
        assert!(points.is_empty());
    }

    #[test]
    fn resampled_curves_match_measured_length() {
        let path = build(&square(10.0, 4.0), PlaybackMode::Looped);
        for waypoint in &path {
            let points = waypoint.path();
            assert!(points.len() >= 2);
            let resampled = polyline_length(points);
            let measured = waypoint.segment_length();
            assert!(
                (resampled - measured).abs() / measured < 0.01,
                "segment {}: {resampled} vs {measured}",
                waypoint.index()
            );
            let next = &path[waypoint.next().unwrap()];
            assert_eq!(*points.last().unwrap(), next.position());
            assert_eq!(points[0], waypoint.position());
        }
    }

    #[test]
    fn random_paths_keep_resampling_invariants() {
        let mut rng = rand::thread_rng();
        for _ in 0..8 {
            let mut x = 0.0;
            let descriptors: Vec<_> = (0..5)
                .map(|_| {
                    x += rng.gen_range(8.0..20.0);
                    WaypointDescriptor::at(Vec3::new(
                        x,
                        rng.gen_range(0.0..4.0),
                        rng.gen_range(-5.0..5.0),
                    ))
                    .with_speed(rng.gen_range(1.0..10.0))
                })
                .collect();
            let path = build(&descriptors, PlaybackMode::SingleShot);
            for waypoint in &path[..path.len() - 1] {
                let points = waypoint.path();
                let measured = waypoint.segment_length();
                assert!(measured >= 0.0);
                assert_eq!(*points.last().unwrap(), path[waypoint.index() + 1].position());
                let resampled = polyline_length(points);
                assert!((resampled - measured).abs() <= measured * 0.01 + 1e-4);
            }
            let terminal = path.last().unwrap();
            assert_eq!(terminal.segment_length(), 0.0);
            assert!(terminal.path().is_empty());
        }
    }

    #[test]
    fn progress_endpoints_match_waypoints_for_all_easings() {
        for easing in EasingType::ALL {
            let descriptors: Vec<_> = square(8.0, 3.0)
                .into_iter()
                .enumerate()
                .map(|(i, d)| d.with_speed(2.0 + i as f32).with_easing(easing, easing, easing))
                .collect();
            let path = build(&descriptors, PlaybackMode::Looped);
            for waypoint in &path {
                let next = &path[waypoint.next().unwrap()];

                let start = waypoint.calculate_progress(0.0, &path);
                assert_eq!(start.position, waypoint.position());
                assert_relative_eq!(start.velocity, waypoint.start_speed());
                assert!(start.rotation.angle_between(waypoint.rotation_start()) < 2e-3);

                let end = waypoint.calculate_progress(1.0, &path);
                assert_eq!(end.position, next.position());
                assert_relative_eq!(end.velocity, next.start_speed(), epsilon = 1e-5);
                assert!(end.rotation.angle_between(waypoint.rotation_end()) < 2e-3);
            }
        }
    }

    #[test]
    fn tangent_look_target_sits_just_ahead() {
        let descriptors: Vec<_> = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, -10.0),
        ]
        .into_iter()
        .map(|p| WaypointDescriptor::at(p).with_speed(4.0))
        .collect();
        let path = build(&descriptors, PlaybackMode::SingleShot);
        let first = &path[0];
        let ahead = first.look_target() - first.position();
        assert!(ahead.length() > 0.0 && ahead.length() < 0.5);
        assert!(ahead.x > 0.0);
        // Heading toward +X is -90 degrees.
        assert_relative_eq!(first.look_angle(), 270.0, epsilon = 0.5);
        let forward = first.rotation_start() * Vec3::NEG_Z;
        assert!(forward.dot(Vec3::X) > 0.99);
    }

    #[test]
    fn fixed_target_offsets() {
        let descriptors = vec![
            WaypointDescriptor::at(Vec3::ZERO)
                .with_speed(1.0)
                .looking_at(Vec3::new(0.0, 5.0, -4.0)),
            WaypointDescriptor::at(Vec3::new(5.0, 0.0, 0.0)).with_speed(1.0),
        ];
        let path = build(&descriptors, PlaybackMode::SingleShot);
        assert_eq!(path[0].look_target(), Vec3::new(0.0, 5.0, -4.0));
        assert_relative_eq!(path[0].look_distance(), 4.0, epsilon = 1e-5);
        assert_relative_eq!(path[0].look_angle(), 360.0, epsilon = 1e-3);
    }

    #[test]
    fn auto_roll_banks_into_turns() {
        let descriptors: Vec<_> = square(10.0, 10.0)
            .into_iter()
            .map(|d| d.with_auto_roll(true))
            .collect();
        let path = build(&descriptors, PlaybackMode::Looped);
        // Counter-clockwise square seen from above: every corner is a left turn.
        for waypoint in &path {
            let right = waypoint.rotation() * Vec3::X;
            assert!(right.y > 0.0, "waypoint {} should bank left", waypoint.index());
            let (axis, angle) = waypoint.rotation().to_axis_angle();
            assert!(axis.abs_diff_eq(Vec3::NEG_Z, 1e-4) || axis.abs_diff_eq(Vec3::Z, 1e-4));
            assert_relative_eq!(angle.to_degrees(), 30.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn auto_roll_skips_chain_ends_and_scales_with_speed() {
        let descriptors: Vec<_> = square(10.0, 2.5)
            .into_iter()
            .map(|d| d.with_auto_roll(true).with_rotation(Quat::from_rotation_x(0.1)))
            .collect();
        let path = build(&descriptors, PlaybackMode::SingleShot);
        assert_eq!(path[0].rotation(), Quat::from_rotation_x(0.1).normalize());
        assert_eq!(path[3].rotation(), Quat::from_rotation_x(0.1).normalize());
        // Speed 2.5 of max 10 gives a quarter of the 30 degree roll.
        let (_, angle) = path[1].rotation().to_axis_angle();
        assert_relative_eq!(angle.to_degrees(), 7.5, epsilon = 1e-2);
    }

    #[test]
    fn unlinked_waypoint_is_left_alone() {
        let waypoint = Waypoint::new(0, &WaypointDescriptor::at(Vec3::ONE));
        let path = vec![waypoint.clone()];
        assert!(path[0].derive(&path, &ctx(PlaybackMode::Looped), true).is_none());
        assert_eq!(waypoint.calculate_progress(0.5, &path).position, Vec3::ONE);
    }

    #[test]
    fn validation_rejects_bad_descriptors() {
        let nan = WaypointDescriptor::at(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(
            nan.validate(2),
            Err(FlythroughError::NonFinite { index: 2, field: "position" })
        );
        let negative = WaypointDescriptor::at(Vec3::ZERO).with_speed(-1.0);
        assert!(matches!(
            negative.validate(0),
            Err(FlythroughError::InvalidValue { field: "start_speed", .. })
        ));
        let zero_rot =
            WaypointDescriptor::at(Vec3::ZERO).with_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert!(matches!(
            zero_rot.validate(0),
            Err(FlythroughError::InvalidValue { field: "rotation", .. })
        ));
        assert!(WaypointDescriptor::at(Vec3::ZERO).with_speed(3.0).validate(0).is_ok());
    }

    #[test]
    fn look_at_tags() {
        assert_eq!(LookAtMode::try_from(RawTag::Index(1)).unwrap(), LookAtMode::FixedTarget);
        assert_eq!("path_tangent".parse::<LookAtMode>().unwrap(), LookAtMode::PathTangent);
        assert!(matches!(
            LookAtMode::try_from(RawTag::Index(7)),
            Err(FlythroughError::UnknownLookAt(_))
        ));
    }
}
