// Flythrough path manager.
//
// Owns the ordered waypoint list, links it into a chain (single-shot) or a
// ring (looped), and runs playback: a distance cursor advances along the
// active segment each logic step and the resulting pose is written, damped,
// into a bound output transform.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::components::Transform;
use super::config::{
    FlythroughConfig, RawTag, default_auto_roll_max_angle, default_auto_roll_max_speed,
    default_frame_time, default_position_damping, default_rotation_damping,
};
use super::error::{FlythroughError, FlythroughResult};
use super::waypoint::{PathContext, PathTuning, Pose, Waypoint, WaypointDescriptor};

// ============================================================================
// MODES AND SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTag")]
pub enum PlaybackMode {
    /// Traverse the chain once and stop at the last waypoint.
    #[default]
    SingleShot = 0,
    /// Traverse the ring indefinitely.
    Looped = 1,
}

impl FromStr for PlaybackMode {
    type Err = FlythroughError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "singleshot" | "once" => Ok(PlaybackMode::SingleShot),
            "looped" | "loop" => Ok(PlaybackMode::Looped),
            _ => Err(FlythroughError::UnknownMode(s.to_string())),
        }
    }
}

impl TryFrom<RawTag> for PlaybackMode {
    type Error = FlythroughError;

    fn try_from(tag: RawTag) -> Result<Self, Self::Error> {
        match tag {
            RawTag::Index(0) => Ok(PlaybackMode::SingleShot),
            RawTag::Index(1) => Ok(PlaybackMode::Looped),
            RawTag::Index(i) => Err(FlythroughError::UnknownMode(i.to_string())),
            RawTag::Name(name) => name.parse(),
        }
    }
}

/// Playback state. `Paused` is reserved; nothing transitions into it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlythroughState {
    #[default]
    Stopped,
    Initialising,
    Started,
    Paused,
}

/// Manager-level construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlythroughSettings {
    pub mode: PlaybackMode,
    /// Speed at which auto-roll reaches its full angle.
    pub auto_roll_max_speed: f32,
    /// Largest auto-roll bank, in degrees.
    pub auto_roll_max_angle: f32,
    /// Nominal seconds per frame.
    pub frame_time: f32,
    /// Rotation smoothing time constant in seconds; 0 copies directly.
    pub rotation_damping: f32,
    /// Position smoothing time constant in seconds; 0 copies directly.
    pub position_damping: f32,
}

impl Default for FlythroughSettings {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::SingleShot,
            auto_roll_max_speed: default_auto_roll_max_speed(),
            auto_roll_max_angle: default_auto_roll_max_angle(),
            frame_time: default_frame_time(),
            rotation_damping: default_rotation_damping(),
            position_damping: default_position_damping(),
        }
    }
}

impl FlythroughSettings {
    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_damping(mut self, rotation: f32, position: f32) -> Self {
        self.rotation_damping = rotation;
        self.position_damping = position;
        self
    }

    pub fn with_auto_roll(mut self, max_speed: f32, max_angle: f32) -> Self {
        self.auto_roll_max_speed = max_speed;
        self.auto_roll_max_angle = max_angle;
        self
    }

    /// `auto_roll_used` requires a positive auto-roll max speed.
    pub fn validate(&self, auto_roll_used: bool) -> FlythroughResult<()> {
        let fields = [
            ("auto_roll_max_speed", self.auto_roll_max_speed),
            ("auto_roll_max_angle", self.auto_roll_max_angle),
            ("frame_time", self.frame_time),
            ("rotation_damping", self.rotation_damping),
            ("position_damping", self.position_damping),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(FlythroughError::InvalidSetting {
                    field,
                    reason: "is not finite".into(),
                });
            }
        }
        for (field, value) in [
            ("rotation_damping", self.rotation_damping),
            ("position_damping", self.position_damping),
        ] {
            if value < 0.0 {
                return Err(FlythroughError::InvalidSetting {
                    field,
                    reason: format!("must not be negative (got {value})"),
                });
            }
        }
        if self.frame_time <= 0.0 {
            return Err(FlythroughError::InvalidSetting {
                field: "frame_time",
                reason: format!("must be positive (got {})", self.frame_time),
            });
        }
        if auto_roll_used && self.auto_roll_max_speed <= 0.0 {
            return Err(FlythroughError::InvalidSetting {
                field: "auto_roll_max_speed",
                reason: "must be positive when auto-roll is enabled".into(),
            });
        }
        Ok(())
    }
}

/// Read-only playback snapshot for hosts and overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub state: FlythroughState,
    pub segment_index: Option<usize>,
    pub segment_distance: f32,
    pub total_distance: f32,
    pub total_length: f32,
    pub total_distance_pct: f32,
    pub velocity: f32,
    pub laps_completed: u32,
    pub frame_time: f32,
}

// ============================================================================
// LINKING
// ============================================================================

/// Assigns indices, end flags and neighbour links.
///
/// Single-shot chains fold back at the ends: the first waypoint's
/// predecessor is the second, and the last waypoint's successor is the
/// second-to-last. Looped paths wrap around.
pub(crate) fn link_waypoints(waypoints: &mut [Waypoint], mode: PlaybackMode) {
    let count = waypoints.len();
    for (i, waypoint) in waypoints.iter_mut().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;
        let (prev, next) = match mode {
            PlaybackMode::SingleShot => {
                let prev = match (is_first, count > 1) {
                    (true, true) => 1,
                    (true, false) => i,
                    _ => i - 1,
                };
                let next = match (is_last, count > 1) {
                    (true, true) => i - 1,
                    (true, false) => i,
                    _ => i + 1,
                };
                (prev, next)
            }
            PlaybackMode::Looped => ((i + count - 1) % count, (i + 1) % count),
        };
        waypoint.link(i, prev, next, is_first, is_last);
    }
}

// ============================================================================
// MANAGER
// ============================================================================

#[derive(Resource, Debug)]
pub struct FlythroughManager {
    waypoints: Vec<Waypoint>,
    settings: FlythroughSettings,
    tuning: PathTuning,
    initialised: bool,

    state: FlythroughState,
    segment: Option<usize>,
    segment_traveled: f32,
    total_traveled: f32,
    total_traveled_pct: f32,
    total_length: f32,
    laps_completed: u32,
    /// Distance into the new lap, applied on the step after a wrap.
    lap_carry: Option<f32>,

    current: Pose,
    /// Seconds covered by the most recent step.
    frame_time: f32,
    /// Set once per logic step, consumed by the next output application.
    update_ready: bool,

    target: Option<Entity>,
}

impl FlythroughManager {
    /// Validates the descriptors and builds the (not yet initialised) manager.
    pub fn new(
        descriptors: &[WaypointDescriptor],
        settings: FlythroughSettings,
    ) -> FlythroughResult<Self> {
        if descriptors.is_empty() {
            return Err(FlythroughError::EmptyPath);
        }
        for (index, descriptor) in descriptors.iter().enumerate() {
            descriptor.validate(index)?;
        }
        settings.validate(descriptors.iter().any(|d| d.auto_roll))?;

        let waypoints = descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| Waypoint::new(index, descriptor))
            .collect();

        Ok(Self {
            waypoints,
            settings,
            tuning: PathTuning::default(),
            initialised: false,
            state: FlythroughState::Stopped,
            segment: None,
            segment_traveled: 0.0,
            total_traveled: 0.0,
            total_traveled_pct: 0.0,
            total_length: 0.0,
            laps_completed: 0,
            lap_carry: None,
            current: Pose {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                velocity: 0.0,
            },
            frame_time: settings.frame_time,
            update_ready: false,
            target: None,
        })
    }

    pub fn from_config(config: &FlythroughConfig) -> FlythroughResult<Self> {
        Self::new(&config.waypoints, config.settings())
    }

    /// Overrides the resampling constants. Takes effect on the next initialise.
    pub fn with_tuning(mut self, tuning: PathTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn set_damping(&mut self, rotation: f32, position: f32) -> FlythroughResult<()> {
        let settings = self.settings.with_damping(rotation, position);
        settings.validate(false)?;
        self.settings = settings;
        Ok(())
    }

    fn context(&self) -> PathContext {
        PathContext {
            mode: self.settings.mode,
            auto_roll_max_speed: self.settings.auto_roll_max_speed,
            auto_roll_max_angle: self.settings.auto_roll_max_angle,
            tuning: self.tuning,
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Links the waypoints, derives every segment and resets the cursors.
    /// Leaves the manager `Stopped`.
    pub fn initialise(&mut self) {
        self.state = FlythroughState::Initialising;

        link_waypoints(&mut self.waypoints, self.settings.mode);

        // Look targets and orientations first, then again with segments once
        // every neighbour has been resolved.
        let ctx = self.context();
        for compute_segments in [false, true] {
            for i in 0..self.waypoints.len() {
                let derived = self.waypoints[i].derive(&self.waypoints, &ctx, compute_segments);
                if let Some(derived) = derived {
                    self.waypoints[i].apply(derived);
                }
            }
        }

        self.total_length = self.waypoints.iter().map(Waypoint::segment_length).sum();
        self.rewind();
        self.initialised = true;
        self.state = FlythroughState::Stopped;

        info!(
            "flythrough initialised: {} waypoints, {:?}, path length {:.3}",
            self.waypoints.len(),
            self.settings.mode,
            self.total_length
        );
    }

    /// Resets the distance cursors to the start of the first segment.
    fn rewind(&mut self) {
        self.segment = if self.waypoints.is_empty() { None } else { Some(0) };
        self.segment_traveled = 0.0;
        self.total_traveled = 0.0;
        self.total_traveled_pct = 0.0;
        self.laps_completed = 0;
        self.lap_carry = None;
        self.update_ready = false;
    }

    /// Starts playback into the bound entity's `Transform`.
    pub fn start(&mut self, world: &mut World, full_reinit: bool) -> FlythroughResult<()> {
        let output = match self.target {
            Some(entity) => world.get_mut::<Transform>(entity),
            None => None,
        };
        match output {
            Some(mut transform) => self.start_with(Some(&mut *transform), full_reinit),
            None => self.start_with(None, full_reinit),
        }
    }

    /// Starts playback, seeding `output` with the pose at the start of the
    /// path without damping. With no output the manager stays `Stopped`.
    pub fn start_with(
        &mut self,
        output: Option<&mut Transform>,
        full_reinit: bool,
    ) -> FlythroughResult<()> {
        if full_reinit || !self.initialised {
            self.initialise();
        } else {
            self.state = FlythroughState::Initialising;
            self.rewind();
        }

        let Some(output) = output else {
            self.state = FlythroughState::Stopped;
            warn!("flythrough not started: no output transform bound");
            return Err(FlythroughError::UnboundOutput);
        };
        let Some(index) = self.segment else {
            self.state = FlythroughState::Stopped;
            return Ok(());
        };

        self.current = self.waypoints[index].calculate_progress(0.0, &self.waypoints);
        output.position = self.current.position;
        output.rotation = self.current.rotation;

        self.state = FlythroughState::Started;
        info!("flythrough started at {:?}", self.current.position);
        Ok(())
    }

    /// Rewinds to the first waypoint and starts again without re-deriving paths.
    pub fn restart(&mut self, world: &mut World) -> FlythroughResult<()> {
        self.start(world, false)
    }

    pub fn stop(&mut self) {
        if self.state == FlythroughState::Started {
            info!("flythrough stopped");
        }
        self.state = FlythroughState::Stopped;
        self.update_ready = false;
    }

    pub fn bind_target(&mut self, entity: Entity) {
        self.target = Some(entity);
    }

    pub fn unbind_target(&mut self) {
        self.target = None;
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    // ------------------------------------------------------------------------
    // Per-frame
    // ------------------------------------------------------------------------

    /// One logic step followed by at most one output application.
    pub fn tick(&mut self, world: &mut World, delta_ms: f32) {
        self.step(delta_ms);
        let Some(entity) = self.target else {
            return;
        };
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            self.apply_output(&mut transform);
        }
    }

    /// Advances the cursor by `delta_ms` milliseconds of travel.
    /// Returns whether a new pose is ready. Does nothing unless `Started`.
    pub fn step(&mut self, delta_ms: f32) -> bool {
        let dt = if delta_ms.is_finite() { (delta_ms / 1000.0).max(0.0) } else { 0.0 };
        self.frame_time = dt;

        if self.state != FlythroughState::Started {
            return false;
        }
        let Some(index) = self.segment else {
            return false;
        };

        if let Some(carry) = self.lap_carry.take() {
            self.total_traveled = carry;
        }

        let t = self.segment_progress(index);
        self.current = self.waypoints[index].calculate_progress(t, &self.waypoints);

        let distance = self.current.velocity * dt;
        self.segment_traveled += distance;
        self.total_traveled += distance;
        self.total_traveled_pct = self.traveled_fraction();

        self.roll_over();
        self.update_ready = true;

        trace!(
            "segment {:?} at {:.3}, total {:.3} ({:.1}%), v = {:.3}",
            self.segment,
            self.segment_traveled,
            self.total_traveled,
            self.total_traveled_pct * 100.0,
            self.current.velocity
        );
        true
    }

    /// Writes the latest pose into `output`, damped by the configured time
    /// constants. Applies each computed pose at most once.
    pub fn apply_output(&mut self, output: &mut Transform) -> bool {
        if !self.update_ready {
            return false;
        }
        self.update_ready = false;

        let dt = self.frame_time;
        let rotation_damping = self.settings.rotation_damping;
        output.rotation = if rotation_damping > 0.0 {
            output
                .rotation
                .slerp(self.current.rotation, (dt / rotation_damping).clamp(0.0, 1.0))
        } else {
            self.current.rotation
        };

        let position_damping = self.settings.position_damping;
        output.position = if position_damping > 0.0 {
            output
                .position
                .lerp(self.current.position, (dt / position_damping).clamp(0.0, 1.0))
        } else {
            self.current.position
        };
        true
    }

    fn segment_progress(&self, index: usize) -> f32 {
        let length = self.waypoints[index].segment_length();
        if length <= 0.0 {
            1.0
        } else {
            (self.segment_traveled / length).clamp(0.0, 1.0)
        }
    }

    fn traveled_fraction(&self) -> f32 {
        if self.total_length > 0.0 {
            self.total_traveled / self.total_length
        } else {
            0.0
        }
    }

    /// Moves the cursor past every segment the traveled distance has exhausted.
    fn roll_over(&mut self) {
        let count = self.waypoints.len();
        while let Some(index) = self.segment {
            let length = self.waypoints[index].segment_length();
            if self.segment_traveled < length {
                break;
            }
            if index + 1 < count {
                self.segment_traveled -= length;
                self.segment = Some(index + 1);
                continue;
            }

            match self.settings.mode {
                PlaybackMode::Looped => {
                    if self.total_length <= 0.0 {
                        self.segment_traveled = 0.0;
                        break;
                    }
                    // Skip whole laps covered by the overflow.
                    let overflow = self.segment_traveled - length;
                    let (extra_laps, overflow) = if overflow.is_finite() {
                        let laps = (overflow / self.total_length).floor() as u32;
                        (laps, overflow.rem_euclid(self.total_length))
                    } else {
                        (0, 0.0)
                    };
                    self.segment_traveled = overflow;
                    self.segment = Some(0);
                    self.total_traveled = self.total_length;
                    self.total_traveled_pct = 1.0;
                    self.lap_carry = Some(overflow);
                    self.laps_completed = self
                        .laps_completed
                        .saturating_add(1)
                        .saturating_add(extra_laps);
                    debug!("flythrough lap {} complete", self.laps_completed);
                }
                PlaybackMode::SingleShot => {
                    self.segment_traveled = length;
                    self.total_traveled = self.total_length;
                    self.total_traveled_pct = 1.0;
                    self.current = self.terminal_pose();
                    self.state = FlythroughState::Stopped;
                    info!("flythrough finished after {:.3} units", self.total_length);
                    break;
                }
            }
        }
        if !self.total_traveled.is_finite() {
            self.total_traveled = self.total_length;
        }
    }

    /// End of the last segment that has a path, so the output lands on the
    /// final waypoint.
    fn terminal_pose(&self) -> Pose {
        self.waypoints
            .iter()
            .rev()
            .find(|waypoint| !waypoint.path().is_empty())
            .unwrap_or(&self.waypoints[self.waypoints.len() - 1])
            .calculate_progress(1.0, &self.waypoints)
    }

    // ------------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------------

    pub fn state(&self) -> FlythroughState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.settings.mode
    }

    pub fn settings(&self) -> &FlythroughSettings {
        &self.settings
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn segment_index(&self) -> Option<usize> {
        self.segment
    }

    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    pub fn total_traveled(&self) -> f32 {
        self.total_traveled
    }

    pub fn total_traveled_pct(&self) -> f32 {
        self.total_traveled_pct
    }

    pub fn current_velocity(&self) -> f32 {
        self.current.velocity
    }

    pub fn current_position(&self) -> Vec3 {
        self.current.position
    }

    pub fn current_rotation(&self) -> Quat {
        self.current.rotation
    }

    pub fn is_update_ready(&self) -> bool {
        self.update_ready
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            state: self.state,
            segment_index: self.segment,
            segment_distance: self.segment_traveled,
            total_distance: self.total_traveled,
            total_length: self.total_length,
            total_distance_pct: self.total_traveled_pct,
            velocity: self.current.velocity,
            laps_completed: self.laps_completed,
            frame_time: self.frame_time,
        }
    }
}
