// Tour configuration loaded from TOML or JSON.
// Authored tours use camelCase keys, numeric enum tags and {x, y, z} vector
// objects; the snake_case names and arrays are accepted too.

use glam::{Quat, Vec3};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

use super::error::{FlythroughError, FlythroughResult};
use super::manager::{FlythroughSettings, PlaybackMode};
use super::waypoint::WaypointDescriptor;

/// Enum tag as written in a config file: either a name or the authored index.
#[doc(hidden)]
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTag {
    Index(u64),
    Name(String),
}

/// Vector as written in a tour file: `[x, y, z]` or `{ x, y, z }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVec3 {
    Array([f32; 3]),
    Object { x: f32, y: f32, z: f32 },
}

/// Quaternion as written in a tour file: `[x, y, z, w]` or `{ x, y, z, w }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuat {
    Array([f32; 4]),
    Object { x: f32, y: f32, z: f32, w: f32 },
}

pub(crate) fn deserialize_vec3<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawVec3::deserialize(deserializer)? {
        RawVec3::Array(v) => Vec3::from_array(v),
        RawVec3::Object { x, y, z } => Vec3::new(x, y, z),
    })
}

pub(crate) fn deserialize_quat<'de, D>(deserializer: D) -> Result<Quat, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawQuat::deserialize(deserializer)? {
        RawQuat::Array(q) => Quat::from_array(q),
        RawQuat::Object { x, y, z, w } => Quat::from_xyzw(x, y, z, w),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlythroughConfig {
    #[serde(default, alias = "flyType")]
    pub mode: PlaybackMode,

    #[serde(default = "default_auto_roll_max_speed", alias = "autoRollMaxSpeed")]
    pub auto_roll_max_speed: f32,

    #[serde(default = "default_auto_roll_max_angle", alias = "autoRollMaxAngle")]
    pub auto_roll_max_angle: f32,

    /// Nominal seconds per frame, used by hosts that step at a fixed rate.
    #[serde(default = "default_frame_time", alias = "frameUpdateTime")]
    pub frame_time: f32,

    #[serde(default = "default_rotation_damping", alias = "rotationDamping")]
    pub rotation_damping: f32,

    #[serde(default = "default_position_damping", alias = "positionDamping")]
    pub position_damping: f32,

    #[serde(default, alias = "poiList")]
    pub waypoints: Vec<WaypointDescriptor>,
}

pub(crate) fn default_auto_roll_max_speed() -> f32 {
    20.0
}
pub(crate) fn default_auto_roll_max_angle() -> f32 {
    30.0
}
pub(crate) fn default_frame_time() -> f32 {
    1.0 / 60.0
}
pub(crate) fn default_rotation_damping() -> f32 {
    0.75
}
pub(crate) fn default_position_damping() -> f32 {
    0.3
}

impl FlythroughConfig {
    /// Loads a config, choosing the parser from the file extension
    /// (`.json` is JSON, anything else is TOML).
    pub fn load(path: impl AsRef<Path>) -> FlythroughResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| FlythroughError::Config {
            path: shown.clone(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        };
        parsed.map_err(|e| match e {
            FlythroughError::Config { reason, .. } => FlythroughError::Config {
                path: shown,
                reason,
            },
            other => other,
        })
    }

    pub fn from_json_str(text: &str) -> FlythroughResult<Self> {
        serde_json::from_str(text).map_err(|e| FlythroughError::Config {
            path: "<json>".into(),
            reason: e.to_string(),
        })
    }

    pub fn from_toml_str(text: &str) -> FlythroughResult<Self> {
        toml::from_str(text).map_err(|e| FlythroughError::Config {
            path: "<toml>".into(),
            reason: e.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> FlythroughResult<String> {
        toml::to_string_pretty(self).map_err(|e| FlythroughError::Config {
            path: "<toml>".into(),
            reason: e.to_string(),
        })
    }

    /// Manager-level parameters, without the waypoint list.
    pub fn settings(&self) -> FlythroughSettings {
        FlythroughSettings {
            mode: self.mode,
            auto_roll_max_speed: self.auto_roll_max_speed,
            auto_roll_max_angle: self.auto_roll_max_angle,
            frame_time: self.frame_time,
            rotation_damping: self.rotation_damping,
            position_damping: self.position_damping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::easing::EasingType;
    use crate::engine::waypoint::LookAtMode;
    use glam::Vec3;

    const AUTHORED_JSON: &str = r#"{
        "flyType": 1,
        "autoRollMaxSpeed": 12,
        "autoRollMaxAngle": 25,
        "frameUpdateTime": 0.02,
        "poiList": [
            {
                "lType": 0, "lAngle": 0, "lDistance": 0,
                "lLocation": [0, 0, 0],
                "startSpeed": 4,
                "velocityEType": 0, "rotationEType": 3, "positionEType": "EaseIn",
                "segmentDist": 0,
                "position": [0, 1, 0],
                "rotation": [0, 0, 0, 1]
            },
            {
                "lType": "FixedTarget",
                "lLocation": [5, 0, 5],
                "startSpeed": 6,
                "position": [10, 1, 0],
                "rotation": [0, 0, 0, 1],
                "autoRoll": true
            }
        ]
    }"#;

    #[test]
    fn parses_authored_json() {
        let config = FlythroughConfig::from_json_str(AUTHORED_JSON).unwrap();
        assert_eq!(config.mode, PlaybackMode::Looped);
        assert_eq!(config.auto_roll_max_speed, 12.0);
        assert_eq!(config.frame_time, 0.02);
        assert_eq!(config.rotation_damping, default_rotation_damping());
        assert_eq!(config.waypoints.len(), 2);

        let first = &config.waypoints[0];
        assert_eq!(first.look_at, LookAtMode::PathTangent);
        assert_eq!(first.rotation_easing, EasingType::EaseInOut);
        assert_eq!(first.position_easing, EasingType::EaseIn);
        assert_eq!(first.position, Vec3::new(0.0, 1.0, 0.0));

        let second = &config.waypoints[1];
        assert_eq!(second.look_at, LookAtMode::FixedTarget);
        assert_eq!(second.velocity_easing, EasingType::Linear);
        assert!(second.auto_roll);
    }

    #[test]
    fn parses_object_form_vectors() {
        let text = r#"{
            "flyType": 0,
            "poiList": [
                {
                    "lType": 1, "lAngle": 0, "lDistance": 0,
                    "lLocation": { "x": 5, "y": 2, "z": -5 },
                    "startSpeed": 3,
                    "velocityEType": 0, "rotationEType": 0, "positionEType": 0,
                    "segmentDist": 0,
                    "position": { "x": 0, "y": 1, "z": 0 },
                    "rotation": { "x": 0, "y": 0, "z": 0, "w": 1 }
                },
                {
                    "lType": 0,
                    "lLocation": { "x": 0, "y": 0, "z": 0 },
                    "startSpeed": 3,
                    "position": { "x": 10.5, "y": 1, "z": -2 },
                    "rotation": [0.5, 0.5, 0.5, 0.5]
                }
            ]
        }"#;
        let config = FlythroughConfig::from_json_str(text).unwrap();
        assert_eq!(config.mode, PlaybackMode::SingleShot);

        let first = &config.waypoints[0];
        assert_eq!(first.position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(first.look_target, Vec3::new(5.0, 2.0, -5.0));
        assert_eq!(first.rotation, glam::Quat::IDENTITY);
        assert_eq!(first.look_at, LookAtMode::FixedTarget);

        let second = &config.waypoints[1];
        assert_eq!(second.position, Vec3::new(10.5, 1.0, -2.0));
        assert_eq!(second.rotation, glam::Quat::from_xyzw(0.5, 0.5, 0.5, 0.5));

        let manager = crate::engine::FlythroughManager::from_config(&config);
        assert!(manager.is_ok());
    }

    #[test]
    fn rejects_incomplete_object_vectors() {
        let text = r#"{ "poiList": [ { "position": { "x": 1, "y": 2 } } ] }"#;
        let err = FlythroughConfig::from_json_str(text).unwrap_err();
        assert!(matches!(err, FlythroughError::Config { .. }));
    }

    #[test]
    fn parses_toml_with_defaults() {
        let text = r#"
            mode = "SingleShot"

            [[waypoints]]
            position = [0.0, 0.0, 0.0]
            start_speed = 5.0

            [[waypoints]]
            position = [10.0, 0.0, 0.0]
            start_speed = 5.0
        "#;
        let config = FlythroughConfig::from_toml_str(text).unwrap();
        assert_eq!(config.mode, PlaybackMode::SingleShot);
        assert_eq!(config.waypoints.len(), 2);
        assert_eq!(config.waypoints[1].rotation, glam::Quat::IDENTITY);
        assert_eq!(config.position_damping, default_position_damping());
    }

    #[test]
    fn toml_round_trips_through_text() {
        let config = FlythroughConfig::from_json_str(AUTHORED_JSON).unwrap();
        let text = config.to_toml_string().unwrap();
        let back = FlythroughConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.waypoints.len(), 2);
        assert_eq!(back.mode, PlaybackMode::Looped);
        assert_eq!(back.waypoints[0].position_easing, EasingType::EaseIn);
    }

    #[test]
    fn rejects_unknown_tags() {
        let text = r#"{ "poiList": [ { "position": [0,0,0], "velocityEType": 9 } ] }"#;
        let err = FlythroughConfig::from_json_str(text).unwrap_err();
        assert!(matches!(err, FlythroughError::Config { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FlythroughConfig::load("/definitely/not/here.toml").unwrap_err();
        match err {
            FlythroughError::Config { path, .. } => assert!(path.ends_with("here.toml")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
