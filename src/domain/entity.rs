/// Entities: Player, static Platform, Hazard (spike), Exit door.
/// Movers live in `kinematics` next to their position function.

use serde::Deserialize;

use super::geometry::Rect;

/// The world that is currently active. Exactly one at any time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum World {
    Light,
    Dark,
}

impl World {
    pub fn other(self) -> World {
        match self {
            World::Light => World::Dark,
            World::Dark => World::Light,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            World::Light => "light",
            World::Dark => "dark",
        }
    }
}

/// Which world(s) an entity exists in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldTag {
    Light,
    Dark,
    #[default]
    Both,
}

impl WorldTag {
    /// Is an entity with this tag present while `world` is active?
    #[inline]
    pub fn active_in(self, world: World) -> bool {
        match self {
            WorldTag::Both => true,
            WorldTag::Light => world == World::Light,
            WorldTag::Dark => world == World::Dark,
        }
    }
}

/// Frame input: a polled snapshot consumed once at the top of a tick.
/// Movement and jump are held state; swap and reset are edge-triggered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub swap: bool,
    pub reset: bool,
    pub select_level: Option<usize>,
}

impl FrameInput {
    /// -1, 0 or +1. Opposing keys cancel.
    pub fn move_dir(&self) -> f64 {
        (self.right as i32 - self.left as i32) as f64
    }

    /// Fold in a newer snapshot while this one waits for a tick.
    /// Held keys follow `next`; presses stay latched until consumed.
    pub fn latch(&mut self, next: FrameInput) {
        self.left = next.left;
        self.right = next.right;
        self.jump = next.jump;
        self.swap |= next.swap;
        self.reset |= next.reset;
        self.select_level = next.select_level.or(self.select_level);
    }

    /// Same held keys with the presses consumed.
    pub fn held_only(self) -> FrameInput {
        FrameInput { left: self.left, right: self.right, jump: self.jump, ..FrameInput::default() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
    pub h: f64,
    pub on_ground: bool,
}

impl Player {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Player { x, y, vx: 0.0, vy: 0.0, w, h, on_ground: false }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Back to a spawn point, at rest.
    pub fn respawn(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.on_ground = false;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Platform {
    pub id: String,
    pub rect: Rect,
    pub world: WorldTag,
}

/// Spike strip. Touching one in the active world resets the level.
#[derive(Clone, Debug, PartialEq)]
pub struct Hazard {
    pub id: String,
    pub rect: Rect,
    pub world: WorldTag,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DoorKind {
    Exit,
    /// Any door type the runtime doesn't act on.
    Decorative,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Door {
    pub id: String,
    pub kind: DoorKind,
    pub rect: Rect,
    pub world: WorldTag,
}
