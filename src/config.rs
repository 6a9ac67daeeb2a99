/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::entity::World;

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub timing: TimingConfig,
    pub player: PlayerConfig,
    pub levels_dir: PathBuf,
    /// Namespace for persisted best times (one table per namespace).
    pub save_namespace: String,
}

/// Per-tick physics constants. Speeds are px/tick, gravity px/tick².
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    pub light_speed: f64,
    pub dark_speed: f64,
    pub light_gravity: f64,
    pub dark_gravity: f64,
    pub jump_impulse: f64,
    pub ground_stick_px: f64,
    pub border_thickness: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    /// Wall time per physics tick. Speeds and gravity are tuned for this rate.
    pub tick_ms: f64,
    pub swap_cooldown_ms: f64,
    pub countdown_unit_ms: f64,
    pub countdown_units: u32,
    pub completion_ms: f64,
    /// Upper bound on a single frame's delta (tab-away, debugger pauses).
    pub max_frame_ms: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub width: f64,
    pub height: f64,
}

impl PhysicsConfig {
    pub fn speed(&self, world: World) -> f64 {
        match world {
            World::Light => self.light_speed,
            World::Dark => self.dark_speed,
        }
    }

    pub fn gravity(&self, world: World) -> f64 {
        match world {
            World::Light => self.light_gravity,
            World::Dark => self.dark_gravity,
        }
    }
}

impl TimingConfig {
    pub fn countdown_ms(&self) -> f64 {
        self.countdown_unit_ms * self.countdown_units as f64
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    physics: TomlPhysics,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    player: TomlPlayer,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlPhysics {
    #[serde(default = "default_light_speed")]
    light_speed: f64,
    #[serde(default = "default_dark_speed")]
    dark_speed: f64,
    #[serde(default = "default_light_gravity")]
    light_gravity: f64,
    #[serde(default = "default_dark_gravity")]
    dark_gravity: f64,
    #[serde(default = "default_jump_impulse")]
    jump_impulse: f64,
    #[serde(default = "default_ground_stick")]
    ground_stick_px: f64,
    #[serde(default = "default_border_thickness")]
    border_thickness: f64,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick")]
    tick_ms: f64,
    #[serde(default = "default_swap_cooldown")]
    swap_cooldown_ms: f64,
    #[serde(default = "default_countdown_unit")]
    countdown_unit_ms: f64,
    #[serde(default = "default_countdown_units")]
    countdown_units: u32,
    #[serde(default = "default_completion")]
    completion_ms: f64,
    #[serde(default = "default_max_frame")]
    max_frame_ms: f64,
}

#[derive(Deserialize, Debug)]
struct TomlPlayer {
    #[serde(default = "default_player_width")]
    width: f64,
    #[serde(default = "default_player_height")]
    height: f64,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_save_namespace")]
    save_namespace: String,
}

// ── Defaults ──

fn default_light_speed() -> f64 { 3.0 }
fn default_dark_speed() -> f64 { 2.4 }
fn default_light_gravity() -> f64 { 0.5 }
fn default_dark_gravity() -> f64 { 0.38 }   // floatier jumps in the dark world
fn default_jump_impulse() -> f64 { -9.5 }
fn default_ground_stick() -> f64 { 2.0 }
fn default_border_thickness() -> f64 { 8.0 }

fn default_tick() -> f64 { 1000.0 / 60.0 }
fn default_swap_cooldown() -> f64 { 300.0 }
fn default_countdown_unit() -> f64 { 1000.0 }
fn default_countdown_units() -> u32 { 3 }
fn default_completion() -> f64 { 2000.0 }
fn default_max_frame() -> f64 { 1000.0 / 30.0 }

fn default_player_width() -> f64 { 18.0 }
fn default_player_height() -> f64 { 24.0 }

fn default_levels_dir() -> String { "levels".into() }
fn default_save_namespace() -> String { "worldswap".into() }

impl Default for TomlPhysics {
    fn default() -> Self {
        TomlPhysics {
            light_speed: default_light_speed(),
            dark_speed: default_dark_speed(),
            light_gravity: default_light_gravity(),
            dark_gravity: default_dark_gravity(),
            jump_impulse: default_jump_impulse(),
            ground_stick_px: default_ground_stick(),
            border_thickness: default_border_thickness(),
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_ms: default_tick(),
            swap_cooldown_ms: default_swap_cooldown(),
            countdown_unit_ms: default_countdown_unit(),
            countdown_units: default_countdown_units(),
            completion_ms: default_completion(),
            max_frame_ms: default_max_frame(),
        }
    }
}

impl Default for TomlPlayer {
    fn default() -> Self {
        TomlPlayer {
            width: default_player_width(),
            height: default_player_height(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            save_namespace: default_save_namespace(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), PathBuf::from(default_levels_dir()))
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/worldswap`.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        Self::load_from(&candidate_dirs())
    }

    /// Load from the first `config.toml` found in `search_dirs`.
    pub fn load_from(search_dirs: &[PathBuf]) -> Self {
        let toml_cfg = load_toml(search_dirs);

        let levels_dir_str = toml_cfg.general.levels_dir.clone();
        let levels_dir = if PathBuf::from(&levels_dir_str).is_absolute() {
            PathBuf::from(&levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(&levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(&levels_dir_str))
        };

        GameConfig::from_toml(toml_cfg, levels_dir)
    }

    /// Parse a config document. Used by `load` and by tests.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        let levels_dir = PathBuf::from(&cfg.general.levels_dir);
        Ok(GameConfig::from_toml(cfg, levels_dir))
    }

    fn from_toml(cfg: TomlConfig, levels_dir: PathBuf) -> Self {
        GameConfig {
            physics: PhysicsConfig {
                light_speed: cfg.physics.light_speed,
                dark_speed: cfg.physics.dark_speed,
                light_gravity: cfg.physics.light_gravity,
                dark_gravity: cfg.physics.dark_gravity,
                jump_impulse: cfg.physics.jump_impulse,
                ground_stick_px: cfg.physics.ground_stick_px,
                border_thickness: cfg.physics.border_thickness,
            },
            timing: TimingConfig {
                tick_ms: cfg.timing.tick_ms,
                swap_cooldown_ms: cfg.timing.swap_cooldown_ms,
                countdown_unit_ms: cfg.timing.countdown_unit_ms,
                countdown_units: cfg.timing.countdown_units,
                completion_ms: cfg.timing.completion_ms,
                max_frame_ms: cfg.timing.max_frame_ms,
            },
            player: PlayerConfig {
                width: cfg.player.width,
                height: cfg.player.height,
            },
            levels_dir,
            save_namespace: cfg.general.save_namespace,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + XDG data dir (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/worldswap");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        tracing::warn!("config.toml parse error: {e}, using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    tracing::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, GameConfig::default());
        assert_eq!(cfg.timing.countdown_ms(), 3000.0);
        assert!((cfg.timing.tick_ms - 1000.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = GameConfig::from_toml_str(
            "[physics]\ndark_gravity = 0.25\n\n[timing]\nswap_cooldown_ms = 500.0\n",
        ).unwrap();
        assert_eq!(cfg.physics.gravity(World::Dark), 0.25);
        assert_eq!(cfg.physics.gravity(World::Light), 0.5);
        assert_eq!(cfg.timing.swap_cooldown_ms, 500.0);
        assert_eq!(cfg.player.height, 24.0);
    }

    #[test]
    fn per_world_speed_lookup() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.physics.speed(World::Light), 3.0);
        assert_eq!(cfg.physics.speed(World::Dark), 2.4);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(GameConfig::from_toml_str("[physics]\nlight_speed = \"fast\"").is_err());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn malformed_file_warns_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[timing\ntick_ms = 5").unwrap();

        let log = Captured::default();
        let sink = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        let cfg = tracing::subscriber::with_default(subscriber, || {
            GameConfig::load_from(&[dir.path().to_path_buf()])
        });

        assert_eq!(cfg.timing, GameConfig::default().timing);
        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"));
        assert!(text.contains("config.toml parse error"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[timing]\ntick_ms = 10.0\n").unwrap();
        let cfg = GameConfig::load_from(&[dir.path().to_path_buf()]);
        assert_eq!(cfg.timing.tick_ms, 10.0);
    }
}
