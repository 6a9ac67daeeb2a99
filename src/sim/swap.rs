/// World swap.
///
/// A swap is allowed when the cooldown since the last successful swap has
/// passed and the player's rectangle, unchanged, would not overlap any
/// blocking solid of the other world. Hazards never block a swap; landing
/// in a spike is the player's problem.

use crate::domain::entity::World;
use crate::domain::geometry::overlaps;
use super::world::WorldState;

/// How long "Can't swap here" stays on the HUD.
const BLOCKED_MESSAGE_MS: f64 = 800.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwapOutcome {
    Swapped(World),
    Blocked,
    CoolingDown,
}

pub fn try_swap(world: &mut WorldState) -> SwapOutcome {
    if let Some(last) = world.last_swap_ms {
        if world.clock_ms - last < world.timing.swap_cooldown_ms {
            return SwapOutcome::CoolingDown;
        }
    }

    let target = world.current_world.other();
    if !is_safe(world, target) {
        tracing::debug!(target_world = target.name(), x = world.player.x, y = world.player.y, "swap blocked");
        world.set_message("Can't swap here", BLOCKED_MESSAGE_MS);
        return SwapOutcome::Blocked;
    }

    world.current_world = target;
    world.last_swap_ms = Some(world.clock_ms);
    tracing::debug!(world = target.name(), "swapped");
    SwapOutcome::Swapped(target)
}

/// True if the player could exist in `target` where it stands now.
pub fn is_safe(world: &WorldState, target: World) -> bool {
    let body = world.player.rect();
    !world
        .solids_for(target, false)
        .iter()
        .any(|s| s.blocks() && overlaps(&body, &s.rect))
}
