// Engine module - flythrough path playback
// Waypoints, spline resampling and the manager state machine, driven by bevy_ecs

pub mod components;
pub mod config;
pub mod easing;
pub mod error;
pub mod heightmap;
pub mod manager;
pub mod spline;
pub mod systems;
pub mod waypoint;

// Re-export commonly used items
pub use components::*;
pub use config::FlythroughConfig;
pub use easing::EasingType;
pub use error::{FlythroughError, FlythroughResult};
pub use heightmap::{HeightQuery, Heightmap, HeightmapSettings};
pub use manager::{FlythroughManager, FlythroughSettings, FlythroughState, PlaybackMode, Telemetry};
pub use systems::{flythrough_system, start_flythrough};
pub use waypoint::{LookAtMode, PathTuning, Pose, Waypoint, WaypointDescriptor};
