// Camera flythrough engine: spline paths through authored waypoints,
// played back at authored speeds into an ECS transform.

pub mod engine;

pub use engine::*;
