// ECS systems driving flythrough playback.
// The manager lives in the world as a resource and writes into the bound
// entity's Transform.

use bevy_ecs::prelude::*;
use log::warn;

use super::components::*;
use super::error::FlythroughResult;
use super::manager::FlythroughManager;

/// One logic step per schedule run, then the damped pose is applied to
/// the bound entity.
pub fn flythrough_system(
    mut manager: ResMut<FlythroughManager>,
    delta: Res<FrameDelta>,
    mut transforms: Query<&mut Transform>,
) {
    if !manager.step(delta.ms) {
        return;
    }
    let Some(entity) = manager.target() else {
        return;
    };
    match transforms.get_mut(entity) {
        Ok(mut transform) => {
            manager.apply_output(&mut transform);
        }
        Err(_) => warn!("flythrough target {entity:?} has no Transform"),
    }
}

/// Starts playback of the manager resource into its bound entity.
pub fn start_flythrough(world: &mut World, full_reinit: bool) -> FlythroughResult<()> {
    world.resource_scope(|world, mut manager: Mut<FlythroughManager>| {
        manager.start(world, full_reinit)
    })
}
