/// Level definitions and loading.
///
/// ## Sources (priority order):
///   1. `levels_dir`: every `*.toml` file, sorted by filename
///   2. Built-in pack embedded at compile time (`assets/builtin_levels.toml`)
///
/// ## Format:
///   ```toml
///   [[level]]
///   name = "Tutorial Valley"
///   width = 2400
///   height = 360
///   spawn = { x = 64, y = 280, world = "light" }
///
///   [[level.platforms]]
///   id = "ground"
///   x = 0
///   y = 332
///   w = 2400
///   h = 28
///   world = "both"
///
///   [[level.movers]]
///   id = "shuttle"
///   w = 80
///   h = 12
///   world = "both"
///   axis = "horizontal"
///   from = { x = 900, y = 280 }
///   to = { x = 1050, y = 280 }
///   cycle_ms = 3000
///
///   [[level.spikes]]
///   id = "ground-spikes1"
///   x = 360
///   y = 320
///   w = 80
///   h = 12
///   attached_to = "ground"      # or: world = "dark"
///
///   [[level.doors]]
///   id = "exit"
///   type = "exit"
///   x = 2320
///   y = 280
///   w = 20
///   h = 40
///   world = "both"
///   ```
///
/// Definitions are immutable snapshots. `build_level` validates one into a
/// runtime `Level`; bad entities are skipped and reported, never fatal.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::entity::{Door, DoorKind, Hazard, Platform, World, WorldTag};
use crate::domain::geometry::{Axis, Rect};
use crate::domain::kinematics::Mover;

const BUILTIN_LEVELS: &str = include_str!("../../assets/builtin_levels.toml");

// ══════════════════════════════════════════════════════════════
// Definitions (as authored)
// ══════════════════════════════════════════════════════════════

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LevelPack {
    #[serde(default, rename = "level")]
    pub levels: Vec<LevelDef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LevelDef {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub spawn: SpawnDef,
    #[serde(default)]
    pub platforms: Vec<RectDef>,
    #[serde(default)]
    pub movers: Vec<MoverDef>,
    #[serde(default)]
    pub spikes: Vec<SpikeDef>,
    #[serde(default)]
    pub doors: Vec<DoorDef>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct SpawnDef {
    pub x: f64,
    pub y: f64,
    pub world: World,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PointDef {
    pub x: f64,
    pub y: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RectDef {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub world: WorldTag,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AxisDef {
    Horizontal,
    Vertical,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MoverDef {
    pub id: String,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub world: WorldTag,
    pub axis: AxisDef,
    pub from: PointDef,
    pub to: PointDef,
    pub cycle_ms: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SpikeDef {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub world: Option<WorldTag>,
    #[serde(default)]
    pub attached_to: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DoorDef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub world: WorldTag,
}

// ══════════════════════════════════════════════════════════════
// Runtime level
// ══════════════════════════════════════════════════════════════

/// A validated level. Entity data is never mutated after build, except
/// each mover's own position.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub spawn: (f64, f64),
    pub spawn_world: World,
    pub platforms: Vec<Platform>,
    pub movers: Vec<Mover>,
    pub hazards: Vec<Hazard>,
    pub doors: Vec<Door>,
}

impl Level {
    pub fn empty() -> Self {
        Level {
            name: String::new(),
            width: 0.0,
            height: 0.0,
            spawn: (0.0, 0.0),
            spawn_world: World::Light,
            platforms: vec![],
            movers: vec![],
            hazards: vec![],
            doors: vec![],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LevelError {
    #[error("no level {index} (pack has {count})")]
    UnknownLevel { index: usize, count: usize },

    #[error("level \"{0}\" has a non-positive arena size")]
    BadArena(String),

    #[error("{0} has a non-positive width or height")]
    DegenerateRect(String),

    #[error("mover {0} has a non-positive cycle")]
    BadCycle(String),

    #[error("duplicate platform/mover id {0}")]
    DuplicateId(String),

    #[error("hazard {hazard} is attached to mover {target}; hazards may only attach to static platforms")]
    AttachedToMover { hazard: String, target: String },

    #[error("hazard {hazard} is attached to unknown platform {target}")]
    UnknownAttachment { hazard: String, target: String },

    #[error("could not read level file {0}")]
    Io(String),

    #[error("level file {file} is malformed: {message}")]
    Parse { file: String, message: String },
}

/// Validate a definition. Returns the level plus every entity that had to
/// be skipped; an unusable arena rejects the whole level.
pub fn build_level(def: &LevelDef) -> Result<(Level, Vec<LevelError>), LevelError> {
    if !(def.width > 0.0 && def.height > 0.0) {
        return Err(LevelError::BadArena(def.name.clone()));
    }

    let mut issues = vec![];
    let mut level = Level {
        name: def.name.clone(),
        width: def.width,
        height: def.height,
        spawn: (def.spawn.x, def.spawn.y),
        spawn_world: def.spawn.world,
        ..Level::empty()
    };

    let id_taken = |level: &Level, id: &str| {
        level.platforms.iter().any(|p| p.id == id) || level.movers.iter().any(|m| m.id == id)
    };

    for p in &def.platforms {
        let rect = Rect::new(p.x, p.y, p.w, p.h);
        if !rect.has_area() {
            issues.push(LevelError::DegenerateRect(format!("platform {}", p.id)));
            continue;
        }
        if id_taken(&level, &p.id) {
            issues.push(LevelError::DuplicateId(p.id.clone()));
            continue;
        }
        level.platforms.push(Platform { id: p.id.clone(), rect, world: p.world });
    }

    for m in &def.movers {
        if !(m.w > 0.0 && m.h > 0.0) {
            issues.push(LevelError::DegenerateRect(format!("mover {}", m.id)));
            continue;
        }
        if !(m.cycle_ms > 0.0) {
            issues.push(LevelError::BadCycle(m.id.clone()));
            continue;
        }
        if id_taken(&level, &m.id) {
            issues.push(LevelError::DuplicateId(m.id.clone()));
            continue;
        }
        let axis = match m.axis {
            AxisDef::Horizontal => Axis::Horizontal,
            AxisDef::Vertical => Axis::Vertical,
        };
        level.movers.push(Mover::new(
            m.id.clone(), m.w, m.h, m.world, axis,
            (m.from.x, m.from.y), (m.to.x, m.to.y), m.cycle_ms,
        ));
    }

    for s in &def.spikes {
        let rect = Rect::new(s.x, s.y, s.w, s.h);
        if !rect.has_area() {
            issues.push(LevelError::DegenerateRect(format!("spike {}", s.id)));
            continue;
        }
        let world = match &s.attached_to {
            None => s.world.unwrap_or_default(),
            Some(target) => {
                if let Some(p) = level.platforms.iter().find(|p| &p.id == target) {
                    p.world
                } else if level.movers.iter().any(|m| &m.id == target) {
                    // A hazard's position is static; a mover's isn't.
                    issues.push(LevelError::AttachedToMover {
                        hazard: s.id.clone(),
                        target: target.clone(),
                    });
                    continue;
                } else {
                    issues.push(LevelError::UnknownAttachment {
                        hazard: s.id.clone(),
                        target: target.clone(),
                    });
                    continue;
                }
            }
        };
        level.hazards.push(Hazard { id: s.id.clone(), rect, world });
    }

    for d in &def.doors {
        let rect = Rect::new(d.x, d.y, d.w, d.h);
        if !rect.has_area() {
            issues.push(LevelError::DegenerateRect(format!("door {}", d.id)));
            continue;
        }
        let kind = if d.kind == "exit" { DoorKind::Exit } else { DoorKind::Decorative };
        level.doors.push(Door { id: d.id.clone(), kind, rect, world: d.world });
    }

    Ok((level, issues))
}

// ══════════════════════════════════════════════════════════════
// Sources
// ══════════════════════════════════════════════════════════════

pub fn parse_pack(text: &str, file: &str) -> Result<Vec<LevelDef>, LevelError> {
    toml::from_str::<LevelPack>(text)
        .map(|pack| pack.levels)
        .map_err(|e| LevelError::Parse { file: file.to_string(), message: e.to_string() })
}

pub fn builtin_levels() -> Result<Vec<LevelDef>, LevelError> {
    parse_pack(BUILTIN_LEVELS, "builtin_levels.toml")
}

/// Levels from `dir` if it holds any, otherwise the built-in pack.
/// Unreadable or malformed files are logged and skipped.
pub fn load_levels(dir: &Path) -> Vec<LevelDef> {
    let from_dir = load_from_directory(dir);
    if !from_dir.is_empty() {
        tracing::info!("loaded {} levels from {}", from_dir.len(), dir.display());
        return from_dir;
    }

    match builtin_levels() {
        Ok(levels) => levels,
        Err(e) => {
            tracing::error!("built-in level pack is unusable: {e}");
            vec![]
        }
    }
}

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |x| x == "toml"))
        .collect();
    files.sort();

    let mut levels = vec![];
    for path in files {
        let name = path.display().to_string();
        let parsed = std::fs::read_to_string(&path)
            .map_err(|_| LevelError::Io(name.clone()))
            .and_then(|text| parse_pack(&text, &name));
        match parsed {
            Ok(mut defs) => levels.append(&mut defs),
            Err(e) => tracing::warn!("{e}"),
        }
    }
    levels
}
