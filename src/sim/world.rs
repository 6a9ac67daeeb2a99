/// WorldState: the simulation context for one running game.
///
/// One instance, owned by the frame driver, passed by `&mut` to every
/// pipeline stage. There is no global state.
///
/// ## Clocks
///
///   - `clock_ms`: monotonic, all phases. Swap cooldown reads it.
///   - `level_time_ms`: drives mover positions. Zeroed on load/reset,
///     frozen during the countdown.
///   - `run_time_ms`: the gameplay timer shown on the HUD and saved as a
///     best time. Advances only while `Running`.
///
/// ## Solids
///
/// `solids_for` builds a fresh registry every call. Nothing here caches it.

use crate::config::{GameConfig, PhysicsConfig, TimingConfig};
use crate::domain::entity::{Player, World};
use crate::domain::solids::{active_solids_for, Arena, Solid};
use crate::sim::level::{Level, LevelDef};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// 3-2-1 before control is handed over. Nothing moves.
    Countdown,
    Running,
    /// Exit reached; the completion message is up, then the next level loads.
    Completing,
}

pub struct WorldState {
    // ── Level data ──
    /// Definitions for every level in the active pack. Never mutated.
    pub levels: Vec<LevelDef>,
    /// The validated current level (movers move, nothing else does).
    pub level: Level,
    pub current_level: usize,

    // ── Entities ──
    pub player: Player,
    pub current_world: World,

    // ── Run state ──
    pub phase: Phase,
    /// Remaining countdown or completion display time.
    pub phase_timer_ms: f64,
    pub level_time_ms: f64,
    pub run_time_ms: f64,
    pub clock_ms: f64,
    pub last_swap_ms: Option<f64>,
    pub best_time_ms: Option<u64>,
    /// Time of the run that just completed (for the completion message).
    pub last_run_ms: Option<u64>,

    // ── Config ──
    pub physics: PhysicsConfig,
    pub timing: TimingConfig,

    // ── UI ──
    pub message: String,
    pub message_timer_ms: f64,
}

impl WorldState {
    pub fn new(config: &GameConfig, levels: Vec<LevelDef>) -> Self {
        WorldState {
            levels,
            level: Level::empty(),
            current_level: 0,
            player: Player::new(0.0, 0.0, config.player.width, config.player.height),
            current_world: World::Light,
            phase: Phase::Countdown,
            phase_timer_ms: config.timing.countdown_ms(),
            level_time_ms: 0.0,
            run_time_ms: 0.0,
            clock_ms: 0.0,
            last_swap_ms: None,
            best_time_ms: None,
            last_run_ms: None,
            physics: config.physics.clone(),
            timing: config.timing.clone(),
            message: String::new(),
            message_timer_ms: 0.0,
        }
    }

    pub fn arena(&self) -> Arena<'_> {
        Arena {
            width: self.level.width,
            border_thickness: self.physics.border_thickness,
            platforms: &self.level.platforms,
            movers: &self.level.movers,
            hazards: &self.level.hazards,
        }
    }

    /// Fresh registry for `world`.
    pub fn solids_for(&self, world: World, include_hazards: bool) -> Vec<Solid> {
        active_solids_for(&self.arena(), world, include_hazards)
    }

    /// Fresh registry for the current world.
    pub fn active_solids(&self, include_hazards: bool) -> Vec<Solid> {
        self.solids_for(self.current_world, include_hazards)
    }

    /// Countdown display value (3, 2, 1), or None outside the countdown.
    pub fn countdown_value(&self) -> Option<u32> {
        if self.phase != Phase::Countdown {
            return None;
        }
        let unit = self.timing.countdown_unit_ms.max(1.0);
        Some((self.phase_timer_ms / unit).ceil().max(0.0) as u32)
    }

    pub fn set_message(&mut self, msg: &str, duration_ms: f64) {
        self.message = msg.to_string();
        self.message_timer_ms = duration_ms;
    }

    pub fn tick_message(&mut self, dt_ms: f64) {
        if self.message_timer_ms > 0.0 {
            self.message_timer_ms -= dt_ms;
            if self.message_timer_ms <= 0.0 {
                self.message_timer_ms = 0.0;
                self.message.clear();
            }
        }
    }
}
