/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use config::GameConfig;
use domain::entity::FrameInput;
use sim::event::GameEvent;
use sim::level::load_levels;
use sim::run::{self, TickClock};
use sim::save::{self, BestTimeStore, FileStore, MemoryStore};
use sim::world::WorldState;
use ui::input::InputState;
use ui::renderer::Renderer;

/// Host loop pacing. Physics runs on its own `TickClock`.
const FRAME_SLEEP: Duration = Duration::from_millis(8);
const LOG_FILE: &str = "worldswap.log";

fn main() {
    let save_dir = save::save_dir();
    init_tracing(&save_dir);
    let config = GameConfig::load();

    let mut store = open_store(&save_dir, &config);

    let levels = load_levels(&config.levels_dir);
    if levels.is_empty() {
        eprintln!("No playable levels found.");
        return;
    }

    let mut world = WorldState::new(&config, levels);
    if let Err(e) = run::load_level(&mut world, 0, &*store, &mut Vec::new()) {
        eprintln!("Could not load the first level: {e}");
        return;
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let honor_release = renderer.enable_key_release();
    tracing::info!(honor_release, "terminal ready");

    let result = game_loop(&mut world, &mut renderer, &mut *store, honor_release);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        tracing::error!("game loop failed: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing World Swap!");
    if let Some(best) = world.best_time_ms {
        println!("Best on {}: {}", world.level.name, run::format_ms(best));
    }
}

/// Log to a file next to the save data; the terminal is in raw mode.
fn init_tracing(dir: &std::path::Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Ok(file) = File::create(dir.join(LOG_FILE)) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn open_store(dir: &std::path::Path, config: &GameConfig) -> Box<dyn BestTimeStore> {
    match FileStore::open(dir, &config.save_namespace) {
        Ok(store) => {
            tracing::info!("best times at {}", store.path().display());
            Box::new(store)
        }
        Err(e) => {
            tracing::warn!("best times will not be saved: {e}");
            Box::new(MemoryStore::new())
        }
    }
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    store: &mut dyn BestTimeStore,
    honor_release: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut clock = TickClock::new(world.timing.tick_ms, world.timing.max_frame_ms);
    let mut pending = FrameInput::default();
    let mut last_frame = Instant::now();

    loop {
        kb.drain_events();
        if kb.quit_pressed() {
            break;
        }

        let now = Instant::now();
        let dt_ms = now.duration_since(last_frame).as_secs_f64() * 1000.0;
        last_frame = now;

        pending.latch(kb.frame_input());
        clock.advance(dt_ms);
        while let Some(tick_ms) = clock.take_tick() {
            let events = run::frame(world, tick_ms, pending, store);
            log_events(&events);
            pending = pending.held_only();
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Per-tick events at trace level; the sim logs the notable ones itself.
fn log_events(events: &[GameEvent]) {
    for event in events {
        match *event {
            GameEvent::LevelLoaded { index } => tracing::trace!(index, "level loaded"),
            GameEvent::CountdownTick { value } => tracing::trace!(value, "countdown"),
            GameEvent::Go => tracing::trace!("go"),
            GameEvent::Jumped => tracing::trace!("jumped"),
            GameEvent::Landed => tracing::trace!("landed"),
            GameEvent::Pushed { mover } => tracing::trace!(mover, "pushed by mover"),
            GameEvent::Swapped { world } => tracing::trace!(world = world.name(), "swapped"),
            GameEvent::SwapBlocked => tracing::trace!("swap blocked"),
            GameEvent::PlayerKilled { cause } => tracing::trace!(?cause, "killed"),
            GameEvent::LevelCompleted { index, time_ms, new_best } => {
                tracing::trace!(index, time = %run::format_ms(time_ms), new_best, "completed")
            }
            GameEvent::LevelAdvanced { index } => tracing::trace!(index, "advanced"),
        }
    }
}
