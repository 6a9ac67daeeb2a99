/// Level run state machine and the per-frame driver.
///
/// ```text
///   load_level ──▶ Countdown ──▶ Running ──exit──▶ Completing ──▶ load_level(next)
///                     ▲             │
///                     └─reset_level─┘  (hazard, pit, reset key)
/// ```
///
/// `frame` is the only entry point the host calls per frame. It owns the
/// phase transitions; `step` only reports what happened.

use crate::domain::entity::FrameInput;
use super::event::GameEvent;
use super::level::{build_level, LevelError};
use super::save::BestTimeStore;
use super::step::{self, StepOutcome};
use super::swap::{try_swap, SwapOutcome};
use super::world::{Phase, WorldState};

/// Frame delta in ms, held to `[0, max_ms]`. A stalled host (suspended
/// terminal, debugger) must not turn into one giant physics step.
pub fn clamp_frame_delta(dt_ms: f64, max_ms: f64) -> f64 {
    if dt_ms.is_finite() { dt_ms.clamp(0.0, max_ms) } else { 0.0 }
}

/// Paces physics ticks against wall time.
///
/// Elapsed time accrues into a backlog; each pass of the host loop may take
/// at most one tick of `tick_ms` from it. The backlog is capped so a stall
/// does not replay as a burst of ticks.
#[derive(Clone, Debug)]
pub struct TickClock {
    tick_ms: f64,
    max_backlog_ms: f64,
    backlog_ms: f64,
}

impl TickClock {
    pub fn new(tick_ms: f64, max_backlog_ms: f64) -> Self {
        let tick_ms = if tick_ms.is_finite() && tick_ms > 0.0 { tick_ms } else { 1000.0 / 60.0 };
        TickClock {
            tick_ms,
            max_backlog_ms: max_backlog_ms.max(tick_ms),
            backlog_ms: 0.0,
        }
    }

    pub fn advance(&mut self, elapsed_ms: f64) {
        let elapsed = clamp_frame_delta(elapsed_ms, self.max_backlog_ms);
        self.backlog_ms = (self.backlog_ms + elapsed).min(self.max_backlog_ms);
    }

    /// The delta for the next tick, if one is due.
    pub fn take_tick(&mut self) -> Option<f64> {
        if self.backlog_ms >= self.tick_ms {
            self.backlog_ms -= self.tick_ms;
            Some(self.tick_ms)
        } else {
            None
        }
    }
}

/// `m:ss.mmm`
pub fn format_ms(ms: u64) -> String {
    format!("{}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}

// ══════════════════════════════════════════════════════════════
// Frame driver
// ══════════════════════════════════════════════════════════════

pub fn frame(
    world: &mut WorldState,
    dt_ms: f64,
    input: FrameInput,
    store: &mut dyn BestTimeStore,
) -> Vec<GameEvent> {
    let dt = clamp_frame_delta(dt_ms, world.timing.max_frame_ms);
    let mut events = Vec::new();

    // ── Meta input: consumes the frame ──
    if let Some(index) = input.select_level {
        if load_level(world, index, store, &mut events).is_ok() {
            return events;
        }
    }
    if input.reset && world.phase != Phase::Completing {
        reset_level(world, &mut events);
        return events;
    }

    world.clock_ms += dt;
    world.tick_message(dt);

    match world.phase {
        Phase::Countdown => tick_countdown(world, dt, &mut events),
        Phase::Running => tick_running(world, dt, input, store, &mut events),
        Phase::Completing => tick_completing(world, dt, store, &mut events),
    }

    events
}

fn tick_countdown(world: &mut WorldState, dt: f64, events: &mut Vec<GameEvent>) {
    let before = world.countdown_value();
    world.phase_timer_ms -= dt;

    if world.phase_timer_ms <= 0.0 {
        world.phase_timer_ms = 0.0;
        world.phase = Phase::Running;
        events.push(GameEvent::Go);
        return;
    }

    let now = world.countdown_value();
    if now != before {
        if let Some(value) = now {
            events.push(GameEvent::CountdownTick { value });
        }
    }
}

fn tick_running(
    world: &mut WorldState,
    dt: f64,
    input: FrameInput,
    store: &mut dyn BestTimeStore,
    events: &mut Vec<GameEvent>,
) {
    world.level_time_ms += dt;
    world.run_time_ms += dt;

    if input.swap {
        match try_swap(world) {
            SwapOutcome::Swapped(w) => events.push(GameEvent::Swapped { world: w }),
            SwapOutcome::Blocked => events.push(GameEvent::SwapBlocked),
            SwapOutcome::CoolingDown => {}
        }
    }

    match step::step(world, input, events) {
        StepOutcome::Continue => {}
        StepOutcome::Died(cause) => {
            tracing::debug!(?cause, x = world.player.x, y = world.player.y, "player died");
            events.push(GameEvent::PlayerKilled { cause });
            reset_level(world, events);
        }
        StepOutcome::ReachedExit => complete_level(world, store, events),
    }
}

fn tick_completing(
    world: &mut WorldState,
    dt: f64,
    store: &mut dyn BestTimeStore,
    events: &mut Vec<GameEvent>,
) {
    // Movers keep animating behind the message; the player doesn't move.
    world.level_time_ms += dt;
    let t = world.level_time_ms;
    for m in world.level.movers.iter_mut() {
        m.update(t);
    }

    world.phase_timer_ms -= dt;
    if world.phase_timer_ms > 0.0 {
        return;
    }

    let count = world.levels.len().max(1);
    let next = (world.current_level + 1) % count;
    match load_level(world, next, store, events) {
        Ok(()) => events.push(GameEvent::LevelAdvanced { index: next }),
        Err(e) => {
            tracing::warn!("could not advance to level {next}: {e}");
            reset_level(world, events);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Transitions
// ══════════════════════════════════════════════════════════════

/// Build level `index` from the pack and start its countdown.
/// On error the world is left exactly as it was.
pub fn load_level(
    world: &mut WorldState,
    index: usize,
    store: &dyn BestTimeStore,
    events: &mut Vec<GameEvent>,
) -> Result<(), LevelError> {
    let Some(def) = world.levels.get(index) else {
        let err = LevelError::UnknownLevel { index, count: world.levels.len() };
        tracing::warn!("{err}");
        return Err(err);
    };

    let (level, issues) = build_level(def).map_err(|e| {
        tracing::warn!("level {index} rejected: {e}");
        e
    })?;
    for issue in &issues {
        tracing::warn!("level {index} ({}): {issue}", level.name);
    }

    tracing::info!(
        index,
        name = %level.name,
        platforms = level.platforms.len(),
        movers = level.movers.len(),
        hazards = level.hazards.len(),
        "level loaded"
    );

    world.level = level;
    world.current_level = index;
    world.best_time_ms = store.best(index);
    world.last_run_ms = None;
    world.message.clear();
    world.message_timer_ms = 0.0;

    events.push(GameEvent::LevelLoaded { index });
    reset_level(world, events);
    Ok(())
}

/// Back to spawn and the countdown, without rebuilding the level.
/// Movers return to their time-0 positions with a zero delta.
pub fn reset_level(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let (sx, sy) = world.level.spawn;
    world.player.respawn(sx, sy);
    world.current_world = world.level.spawn_world;

    world.level_time_ms = 0.0;
    world.run_time_ms = 0.0;
    world.last_swap_ms = None;
    for m in world.level.movers.iter_mut() {
        m.settle(0.0);
    }

    world.phase = Phase::Countdown;
    world.phase_timer_ms = world.timing.countdown_ms();
    if let Some(value) = world.countdown_value() {
        events.push(GameEvent::CountdownTick { value });
    }
}

/// Exit reached: freeze, score the run, show the result.
pub fn complete_level(
    world: &mut WorldState,
    store: &mut dyn BestTimeStore,
    events: &mut Vec<GameEvent>,
) {
    world.player.vx = 0.0;
    world.player.vy = 0.0;

    let index = world.current_level;
    let time_ms = world.run_time_ms.round() as u64;
    let new_best = store.best(index).map_or(true, |best| time_ms < best);

    if new_best {
        if let Err(e) = store.record(index, time_ms) {
            tracing::warn!("could not save best time for level {index}: {e}");
        }
        world.best_time_ms = Some(time_ms);
    }
    world.last_run_ms = Some(time_ms);

    tracing::info!(index, time_ms, new_best, "level complete");

    let msg = if new_best {
        format!("Level complete! {}  NEW BEST", format_ms(time_ms))
    } else {
        format!("Level complete! {}", format_ms(time_ms))
    };
    world.set_message(&msg, world.timing.completion_ms);
    world.phase = Phase::Completing;
    world.phase_timer_ms = world.timing.completion_ms;

    events.push(GameEvent::LevelCompleted { index, time_ms, new_best });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::entity::World;
    use crate::sim::event::DeathCause;
    use crate::sim::level::parse_pack;
    use crate::sim::save::MemoryStore;

    const PACK: &str = r#"
        [[level]]
        name = "Alpha"
        width = 640
        height = 360
        spawn = { x = 64, y = 308, world = "light" }

        [[level.platforms]]
        id = "ground"
        x = 0
        y = 332
        w = 640
        h = 28

        [[level.platforms]]
        id = "dark-pillar"
        x = 200
        y = 200
        w = 40
        h = 132
        world = "dark"

        [[level.movers]]
        id = "shuttle"
        w = 60
        h = 12
        axis = "horizontal"
        from = { x = 400, y = 200 }
        to = { x = 560, y = 200 }
        cycle_ms = 2000

        [[level.spikes]]
        id = "spikes"
        x = 300
        y = 320
        w = 40
        h = 12
        attached_to = "ground"

        [[level.doors]]
        id = "exit"
        type = "exit"
        x = 600
        y = 292
        w = 20
        h = 40

        [[level]]
        name = "Beta"
        width = 800
        height = 360
        spawn = { x = 40, y = 308, world = "dark" }

        [[level.platforms]]
        id = "ground"
        x = 0
        y = 332
        w = 800
        h = 28
    "#;

    const DT: f64 = 25.0;

    fn setup() -> (WorldState, MemoryStore) {
        let levels = parse_pack(PACK, "test").unwrap();
        let mut world = WorldState::new(&GameConfig::default(), levels);
        let store = MemoryStore::new();
        load_level(&mut world, 0, &store, &mut vec![]).unwrap();
        (world, store)
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    /// Run frames until the countdown hands over control.
    fn skip_countdown(world: &mut WorldState, store: &mut MemoryStore) -> Vec<GameEvent> {
        let mut all = vec![];
        while world.phase == Phase::Countdown {
            all.extend(frame(world, DT, idle(), store));
        }
        all
    }

    fn put_player_at(world: &mut WorldState, x: f64) {
        world.player.x = x;
        world.player.y = 308.0;
        world.player.on_ground = true;
    }

    #[test]
    fn frame_delta_is_clamped() {
        let max = 1000.0 / 30.0;
        assert_eq!(clamp_frame_delta(16.0, max), 16.0);
        assert_eq!(clamp_frame_delta(1000.0, max), max);
        assert_eq!(clamp_frame_delta(-5.0, max), 0.0);
        assert_eq!(clamp_frame_delta(f64::NAN, max), 0.0);
    }

    #[test]
    fn tick_rate_does_not_follow_loop_rate() {
        for pass_ms in [5.0, 10.0, 20.0] {
            let mut clock = TickClock::new(10.0, 40.0);
            let mut ticks = 0;
            let mut simulated = 0.0;
            for _ in 0..(1000.0 / pass_ms) as usize {
                clock.advance(pass_ms);
                while let Some(dt) = clock.take_tick() {
                    ticks += 1;
                    simulated += dt;
                }
            }
            assert_eq!(ticks, 100, "pass of {pass_ms}ms");
            assert_eq!(simulated, 1000.0);
        }
    }

    #[test]
    fn stall_does_not_replay_as_a_burst() {
        let mut clock = TickClock::new(10.0, 40.0);
        clock.advance(5000.0);
        let mut ticks = 0;
        while clock.take_tick().is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 4);
        clock.advance(f64::NAN);
        assert_eq!(clock.take_tick(), None);
    }

    #[test]
    fn run_distance_is_the_same_at_any_loop_rate() {
        let mut finish = vec![];
        for pass_ms in [5.0, 20.0] {
            let (mut world, mut store) = setup();
            load_level(&mut world, 1, &store, &mut vec![]).unwrap();
            skip_countdown(&mut world, &mut store);
            let start = world.player.x;

            let mut clock = TickClock::new(10.0, 40.0);
            for _ in 0..(400.0 / pass_ms) as usize {
                clock.advance(pass_ms);
                while let Some(dt) = clock.take_tick() {
                    frame(&mut world, dt, FrameInput { right: true, ..idle() }, &mut store);
                }
            }
            finish.push(world.player.x - start);
        }
        assert!((finish[0] - 40.0 * 2.4).abs() < 1e-9);
        assert_eq!(finish[0], finish[1]);
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_ms(0), "0:00.000");
        assert_eq!(format_ms(18_342), "0:18.342");
        assert_eq!(format_ms(125_007), "2:05.007");
    }

    #[test]
    fn load_enters_countdown_at_spawn() {
        let levels = parse_pack(PACK, "test").unwrap();
        let mut world = WorldState::new(&GameConfig::default(), levels);
        let store = MemoryStore::new();
        let mut events = vec![];
        load_level(&mut world, 1, &store, &mut events).unwrap();

        assert_eq!(events, vec![
            GameEvent::LevelLoaded { index: 1 },
            GameEvent::CountdownTick { value: 3 },
        ]);
        assert_eq!(world.current_level, 1);
        assert_eq!(world.level.name, "Beta");
        assert_eq!(world.phase, Phase::Countdown);
        assert_eq!(world.current_world, World::Dark);
        assert_eq!((world.player.x, world.player.y), (40.0, 308.0));
        assert_eq!(world.run_time_ms, 0.0);
        assert_eq!(world.level_time_ms, 0.0);
    }

    #[test]
    fn countdown_ticks_then_go() {
        let (mut world, mut store) = setup();
        let events = skip_countdown(&mut world, &mut store);
        assert_eq!(events, vec![
            GameEvent::CountdownTick { value: 2 },
            GameEvent::CountdownTick { value: 1 },
            GameEvent::Go,
        ]);
        assert_eq!(world.phase, Phase::Running);
    }

    #[test]
    fn nothing_moves_during_countdown() {
        let (mut world, mut store) = setup();
        let mover_x = world.level.movers[0].rect.x;
        for _ in 0..20 {
            frame(&mut world, DT, FrameInput { right: true, swap: true, ..idle() }, &mut store);
        }
        assert_eq!(world.phase, Phase::Countdown);
        assert_eq!(world.player.x, 64.0);
        assert_eq!(world.current_world, World::Light);
        assert_eq!(world.level.movers[0].rect.x, mover_x);
        assert_eq!(world.run_time_ms, 0.0);
        assert_eq!(world.level_time_ms, 0.0);
        assert!(world.clock_ms > 0.0);
    }

    #[test]
    fn running_advances_clocks_and_player() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        frame(&mut world, 16.0, FrameInput { right: true, ..idle() }, &mut store);
        assert_eq!(world.run_time_ms, 16.0);
        assert_eq!(world.level_time_ms, 16.0);
        assert_eq!(world.player.x, 64.0 + world.physics.light_speed);
    }

    #[test]
    fn long_frames_are_capped() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        frame(&mut world, 5000.0, idle(), &mut store);
        assert_eq!(world.run_time_ms, world.timing.max_frame_ms);
    }

    #[test]
    fn swap_happens_only_while_running() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        let events = frame(&mut world, DT, FrameInput { swap: true, ..idle() }, &mut store);
        assert!(events.contains(&GameEvent::Swapped { world: World::Dark }));
        assert_eq!(world.current_world, World::Dark);
    }

    #[test]
    fn swap_into_pillar_is_refused() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        put_player_at(&mut world, 210.0);
        let events = frame(&mut world, DT, FrameInput { swap: true, ..idle() }, &mut store);
        assert!(events.contains(&GameEvent::SwapBlocked));
        assert_eq!(world.current_world, World::Light);
        assert_eq!(world.message, "Can't swap here");
    }

    #[test]
    fn pit_resets_to_spawn() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        for _ in 0..10 {
            frame(&mut world, DT, idle(), &mut store);
        }
        frame(&mut world, DT, FrameInput { swap: true, ..idle() }, &mut store);
        assert_eq!(world.current_world, World::Dark);
        world.player.y = 360.0;

        let events = frame(&mut world, DT, idle(), &mut store);
        assert!(events.contains(&GameEvent::PlayerKilled { cause: DeathCause::Pit }));
        assert_eq!((world.player.x, world.player.y), (64.0, 308.0));
        assert_eq!((world.player.vx, world.player.vy), (0.0, 0.0));
        assert_eq!(world.current_world, World::Light);
        assert_eq!(world.run_time_ms, 0.0);
        assert_eq!(world.level_time_ms, 0.0);
        assert_eq!(world.level.movers[0].delta(), (0.0, 0.0));
        assert_eq!(world.level.movers[0].rect.x, 400.0);
        assert_eq!(world.phase, Phase::Countdown);
    }

    #[test]
    fn hazard_resets_to_spawn() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        put_player_at(&mut world, 310.0);
        let events = frame(&mut world, DT, idle(), &mut store);
        assert!(events.contains(&GameEvent::PlayerKilled { cause: DeathCause::Hazard }));
        assert_eq!(world.player.x, 64.0);
        assert_eq!(world.phase, Phase::Countdown);
    }

    #[test]
    fn reset_key_restarts_the_run() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        for _ in 0..10 {
            frame(&mut world, DT, FrameInput { right: true, ..idle() }, &mut store);
        }
        assert!(world.player.x > 64.0);

        let events = frame(&mut world, DT, FrameInput { reset: true, ..idle() }, &mut store);
        assert_eq!(events, vec![GameEvent::CountdownTick { value: 3 }]);
        assert_eq!(world.player.x, 64.0);
        assert_eq!(world.run_time_ms, 0.0);
    }

    #[test]
    fn exit_records_first_best_time() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        for _ in 0..4 {
            frame(&mut world, DT, idle(), &mut store);
        }
        put_player_at(&mut world, 595.0);
        let events = frame(&mut world, DT, idle(), &mut store);

        assert!(events.contains(&GameEvent::LevelCompleted { index: 0, time_ms: 125, new_best: true }));
        assert_eq!(store.best(0), Some(125));
        assert_eq!(world.best_time_ms, Some(125));
        assert_eq!(world.last_run_ms, Some(125));
        assert_eq!(world.phase, Phase::Completing);
        assert_eq!((world.player.vx, world.player.vy), (0.0, 0.0));
        assert!(world.message.starts_with("Level complete!"));
    }

    #[test]
    fn slower_run_keeps_previous_best() {
        let (mut world, mut store) = setup();
        store.record(0, 50).unwrap();
        skip_countdown(&mut world, &mut store);
        for _ in 0..4 {
            frame(&mut world, DT, idle(), &mut store);
        }
        put_player_at(&mut world, 595.0);
        let events = frame(&mut world, DT, idle(), &mut store);

        assert!(events.contains(&GameEvent::LevelCompleted { index: 0, time_ms: 125, new_best: false }));
        assert_eq!(store.best(0), Some(50));
    }

    #[test]
    fn best_time_is_loaded_with_level() {
        let levels = parse_pack(PACK, "test").unwrap();
        let mut world = WorldState::new(&GameConfig::default(), levels);
        let mut store = MemoryStore::new();
        store.record(1, 9_999).unwrap();
        load_level(&mut world, 1, &store, &mut vec![]).unwrap();
        assert_eq!(world.best_time_ms, Some(9_999));
    }

    #[test]
    fn completion_advances_then_wraps() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        put_player_at(&mut world, 595.0);
        frame(&mut world, DT, idle(), &mut store);
        assert_eq!(world.phase, Phase::Completing);

        let mover_x = world.level.movers[0].rect.x;
        let player_x = world.player.x;
        let mut advanced = vec![];
        let mut mover_moved = false;
        while world.phase == Phase::Completing {
            let events = frame(&mut world, DT, FrameInput { right: true, ..idle() }, &mut store);
            if world.phase == Phase::Completing {
                assert_eq!(world.player.x, player_x);
                mover_moved |= world.level.movers[0].rect.x != mover_x;
            }
            advanced.extend(events.into_iter().filter(|e| matches!(e, GameEvent::LevelAdvanced { .. })));
        }
        assert!(mover_moved);
        assert_eq!(advanced, vec![GameEvent::LevelAdvanced { index: 1 }]);
        assert_eq!(world.current_level, 1);
        assert_eq!(world.phase, Phase::Countdown);

        // Last level wraps to the first.
        complete_level(&mut world, &mut store, &mut vec![]);
        let mut events = vec![];
        while world.phase == Phase::Completing {
            events.extend(frame(&mut world, DT, idle(), &mut store));
        }
        assert!(events.contains(&GameEvent::LevelAdvanced { index: 0 }));
        assert_eq!(world.current_level, 0);
    }

    #[test]
    fn reset_is_ignored_while_completing() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        put_player_at(&mut world, 595.0);
        frame(&mut world, DT, idle(), &mut store);
        frame(&mut world, DT, FrameInput { reset: true, ..idle() }, &mut store);
        assert_eq!(world.phase, Phase::Completing);
    }

    #[test]
    fn select_level_loads_it() {
        let (mut world, mut store) = setup();
        let events = frame(&mut world, DT, FrameInput { select_level: Some(1), ..idle() }, &mut store);
        assert!(events.contains(&GameEvent::LevelLoaded { index: 1 }));
        assert_eq!(world.current_level, 1);
    }

    #[test]
    fn unknown_level_is_a_no_op() {
        let (mut world, mut store) = setup();
        skip_countdown(&mut world, &mut store);
        put_player_at(&mut world, 100.0);

        let err = load_level(&mut world, 7, &store, &mut vec![]).unwrap_err();
        assert_eq!(err, LevelError::UnknownLevel { index: 7, count: 2 });
        assert_eq!(world.current_level, 0);
        assert_eq!(world.phase, Phase::Running);
        assert_eq!(world.player.x, 100.0);

        // Through the frame driver the frame simply runs on.
        let events = frame(&mut world, DT, FrameInput { select_level: Some(7), ..idle() }, &mut store);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::LevelLoaded { .. })));
        assert_eq!(world.current_level, 0);
        assert_eq!(world.phase, Phase::Running);
    }
}
