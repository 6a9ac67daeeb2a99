/// Solid registry: every collidable rectangle active in one world.
///
/// Rebuilt from scratch on each call from the authoritative entities
/// (platforms, movers, level bounds). Collision resolution and the swap
/// check both go through `active_solids_for`, so "what blocks movement"
/// and "what blocks a swap" can never disagree. Do not cache the result
/// across frames or between those two uses.

use super::entity::{Hazard, Platform, World, WorldTag};
use super::geometry::Rect;
use super::kinematics::Mover;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SolidKind {
    Static,
    /// Index into the level's mover list, plus its delta for this frame.
    Mover { index: usize, dx: f64, dy: f64 },
    Border,
    Hazard,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Solid {
    pub rect: Rect,
    pub world: WorldTag,
    pub kind: SolidKind,
}

impl Solid {
    /// Does this solid stop movement? Hazards kill instead.
    #[inline]
    pub fn blocks(&self) -> bool {
        !matches!(self.kind, SolidKind::Hazard)
    }
}

/// Borrowed view of the entities a registry is built from.
#[derive(Clone, Copy)]
pub struct Arena<'a> {
    pub width: f64,
    pub border_thickness: f64,
    pub platforms: &'a [Platform],
    pub movers: &'a [Mover],
    pub hazards: &'a [Hazard],
}

/// Registry order: ceiling border, static platforms, movers, then hazards
/// when asked for. Resolver tie-breaks follow this order.
pub fn active_solids_for(arena: &Arena<'_>, world: World, include_hazards: bool) -> Vec<Solid> {
    let mut solids = Vec::with_capacity(
        1 + arena.platforms.len() + arena.movers.len()
            + if include_hazards { arena.hazards.len() } else { 0 },
    );

    // Ceiling only: the sides and the bottom are open on purpose (death pit).
    solids.push(Solid {
        rect: Rect::new(0.0, -arena.border_thickness, arena.width, arena.border_thickness),
        world: WorldTag::Both,
        kind: SolidKind::Border,
    });

    for p in arena.platforms.iter().filter(|p| p.world.active_in(world)) {
        solids.push(Solid { rect: p.rect, world: p.world, kind: SolidKind::Static });
    }

    for (index, m) in arena.movers.iter().enumerate() {
        if !m.world.active_in(world) { continue; }
        let (dx, dy) = m.delta();
        solids.push(Solid {
            rect: m.rect,
            world: m.world,
            kind: SolidKind::Mover { index, dx, dy },
        });
    }

    if include_hazards {
        for h in arena.hazards.iter().filter(|h| h.world.active_in(world)) {
            solids.push(Solid { rect: h.rect, world: h.world, kind: SolidKind::Hazard });
        }
    }

    debug_assert!(solids.iter().all(|s| s.world.active_in(world)));
    solids
}
