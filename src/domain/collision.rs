/// Axis-separated collision primitives.
///
/// Two resolvers with different contracts:
///   - `resolve_axis_blocking`: the player's own motion. Direction comes
///     from the sign of the player's velocity; the first overlapping solid
///     in registry order wins and the velocity on that axis is zeroed.
///   - `sweep_axis`: push and carry. Direction comes from a known
///     displacement; every overlapping solid tightens the bound, so a push
///     can be stopped by a different solid than the one doing the pushing.
///
/// Both are discrete: the body is tested at its candidate position only.

use super::geometry::{overlaps, Axis, Rect};
use super::solids::{Solid, SolidKind};

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Hit {
    pub kind: SolidKind,
    /// True when the body was moving toward increasing coordinate
    /// (right, or down onto a floor).
    pub positive: bool,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Resolved {
    pub pos: f64,
    pub velocity: f64,
    pub hit: Option<Hit>,
}

impl Resolved {
    /// Vertical only: came down onto something.
    pub fn landed(&self) -> bool {
        matches!(self.hit, Some(Hit { positive: true, .. }))
    }

    /// Vertical only: index of the mover we landed on, if any.
    pub fn landed_on_mover(&self) -> Option<usize> {
        match self.hit {
            Some(Hit { kind: SolidKind::Mover { index, .. }, positive: true }) => Some(index),
            _ => None,
        }
    }
}

/// Resolve `body` (already at its candidate position) against `solids`.
///
/// Snaps to the near face of the first overlapping blocking solid: the
/// left/top face when `velocity > 0`, the right/bottom face when
/// `velocity < 0`. With zero velocity there is no direction to snap in and
/// the body is returned unchanged. A non-overlapping body is returned as is.
pub fn resolve_axis_blocking(body: Rect, velocity: f64, solids: &[Solid], axis: Axis) -> Resolved {
    let unchanged = Resolved { pos: body.pos(axis), velocity, hit: None };

    let Some(solid) = solids.iter().find(|s| s.blocks() && overlaps(&body, &s.rect)) else {
        return unchanged;
    };

    let pos = if velocity > 0.0 {
        solid.rect.pos(axis) - body.extent(axis)
    } else if velocity < 0.0 {
        solid.rect.pos(axis) + solid.rect.extent(axis)
    } else {
        return unchanged;
    };

    Resolved {
        pos,
        velocity: 0.0,
        hit: Some(Hit { kind: solid.kind, positive: velocity > 0.0 }),
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Sweep {
    pub pos: f64,
    /// Stopped short of the target (by a solid or the level edge).
    pub blocked: bool,
}

/// Move `body` along `axis` toward `target`, stopping at the most
/// restrictive near face among all blocking solids the body would overlap
/// at `target`. Horizontal sweeps are also held inside `[0, level_width]`.
/// The result never lies behind the starting position.
pub fn sweep_axis(body: Rect, target: f64, solids: &[Solid], axis: Axis, level_width: f64) -> Sweep {
    let from = body.pos(axis);
    let extent = body.extent(axis);
    let placed = body.with_pos(axis, target);
    let forward = target > from;

    let mut pos = target;
    if target != from {
        for s in solids.iter().filter(|s| s.blocks() && overlaps(&placed, &s.rect)) {
            pos = if forward {
                pos.min(s.rect.pos(axis) - extent)
            } else {
                pos.max(s.rect.pos(axis) + s.rect.extent(axis))
            };
        }
        pos = if forward { pos.max(from) } else { pos.min(from) };
    }

    if axis == Axis::Horizontal {
        pos = pos.clamp(0.0, (level_width - extent).max(0.0));
    }

    Sweep { pos, blocked: pos != target }
}
