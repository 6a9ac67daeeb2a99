/// Events emitted during a frame.
/// The presentation layer consumes these for HUD/animation.

use crate::domain::entity::World;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    Hazard,
    Pit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    LevelLoaded { index: usize },
    CountdownTick { value: u32 },
    Go,
    Jumped,
    Landed,
    Pushed { mover: usize },
    Swapped { world: World },
    SwapBlocked,
    PlayerKilled { cause: DeathCause },
    LevelCompleted { index: usize, time_ms: u64, new_best: bool },
    LevelAdvanced { index: usize },
}
