/// The physics pipeline: advances the running level by one tick.
///
/// Processing order:
///   1. Mover update        (positions from `level_time_ms`, deltas recorded)
///   2. Kinematic push      (movers that moved INTO the player shove it out)
///   3. Input integration   (run speed, jump, gravity)
///   4. Horizontal resolve  (level bounds, then blocking solids)
///   5. Ground stick        (re-seat on a surface just below the feet)
///   6. Vertical resolve    (landing / bonking; notes a mover underfoot)
///   7. Carry               (ride the mover we're standing on)
///   8. Death pit           (fell below the arena)
/// followed by hazard and exit contact.
///
/// Push must run before the player's own motion.
/// The solid registry is built once after step 1 and shared by steps 2-7.

use crate::domain::collision::{resolve_axis_blocking, sweep_axis};
use crate::domain::entity::{Door, DoorKind, FrameInput};
use crate::domain::geometry::{overlaps, Axis};
use crate::domain::solids::{Solid, SolidKind};
use super::event::{DeathCause, GameEvent};
use super::world::WorldState;

/// Mover deltas at or below this (|dx| + |dy|) never push.
const PUSH_EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Continue,
    Died(DeathCause),
    ReachedExit,
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: FrameInput, events: &mut Vec<GameEvent>) -> StepOutcome {
    let was_grounded = world.player.on_ground;

    update_movers(world);
    let solids = world.active_solids(false);

    kinematic_push(world, &solids, events);
    integrate_input(world, input, events);
    resolve_horizontal(world, &solids);
    ground_stick(world, &solids);
    let riding = resolve_vertical(world, &solids);
    carry(world, &solids, riding);

    if world.player.on_ground && !was_grounded {
        events.push(GameEvent::Landed);
    }

    if fell_into_pit(world) {
        return StepOutcome::Died(DeathCause::Pit);
    }
    if touching_hazard(world) {
        return StepOutcome::Died(DeathCause::Hazard);
    }
    if let Some(exit) = touching_exit(world) {
        tracing::debug!(door = %exit.id, "exit reached");
        return StepOutcome::ReachedExit;
    }
    StepOutcome::Continue
}

// ══════════════════════════════════════════════════════════════
// 1. Movers
// ══════════════════════════════════════════════════════════════

fn update_movers(world: &mut WorldState) {
    let t = world.level_time_ms;
    for m in world.level.movers.iter_mut() {
        m.update(t);
    }
}

// ══════════════════════════════════════════════════════════════
// 2. Kinematic push
// ══════════════════════════════════════════════════════════════

/// A mover that overlaps the player now but didn't at its previous
/// position has moved into the player. Sweep the player out along the
/// mover's direction of travel by |delta| + 1, horizontal then vertical.
fn kinematic_push(world: &mut WorldState, solids: &[Solid], events: &mut Vec<GameEvent>) {
    let level_width = world.level.width;

    for s in solids {
        let SolidKind::Mover { index, dx, dy } = s.kind else { continue };
        if dx.abs() + dy.abs() <= PUSH_EPSILON { continue; }

        let body = world.player.rect();
        let before = s.rect.offset(-dx, -dy);
        if !overlaps(&s.rect, &body) || overlaps(&before, &body) { continue; }

        let p = &mut world.player;
        if dx != 0.0 {
            let target = p.x + dx.signum() * (dx.abs() + 1.0);
            p.x = sweep_axis(p.rect(), target, solids, Axis::Horizontal, level_width).pos;
        }
        if dy != 0.0 {
            let target = p.y + dy.signum() * (dy.abs() + 1.0);
            p.y = sweep_axis(p.rect(), target, solids, Axis::Vertical, level_width).pos;
        }
        events.push(GameEvent::Pushed { mover: index });
    }
}

// ══════════════════════════════════════════════════════════════
// 3. Input
// ══════════════════════════════════════════════════════════════

/// No acceleration model: held keys set the velocity outright. Jumping
/// reads last tick's ground state; grounding is then recomputed below.
fn integrate_input(world: &mut WorldState, input: FrameInput, events: &mut Vec<GameEvent>) {
    let speed = world.physics.speed(world.current_world);
    let gravity = world.physics.gravity(world.current_world);
    let p = &mut world.player;

    p.vx = input.move_dir() * speed;
    if input.jump && p.on_ground {
        p.vy = world.physics.jump_impulse;
        events.push(GameEvent::Jumped);
    }
    p.on_ground = false;
    p.vy += gravity;
}

// ══════════════════════════════════════════════════════════════
// 4. Horizontal
// ══════════════════════════════════════════════════════════════

fn resolve_horizontal(world: &mut WorldState, solids: &[Solid]) {
    let max_x = (world.level.width - world.player.w).max(0.0);
    let p = &mut world.player;

    let mut x = p.x + p.vx;
    if x < 0.0 {
        x = 0.0;
        p.vx = 0.0;
    } else if x > max_x {
        x = max_x;
        p.vx = 0.0;
    }

    let r = resolve_axis_blocking(p.rect().at(x, p.y), p.vx, solids, Axis::Horizontal);
    p.x = r.pos;
    p.vx = r.velocity;
}

// ══════════════════════════════════════════════════════════════
// 5. Ground stick
// ══════════════════════════════════════════════════════════════

/// A vertical mover stepping down can open a sub-pixel gap under the
/// player for one tick. If a surface top is within (0, epsilon) below the
/// feet, sit back down on it so the mover keeps carrying us.
fn ground_stick(world: &mut WorldState, solids: &[Solid]) {
    let eps = world.physics.ground_stick_px;
    let p = &mut world.player;
    if p.on_ground || p.vy < 0.0 { return; }

    let feet = p.rect().bottom();
    let seat = solids.iter().find(|s| {
        let gap = s.rect.y - feet;
        s.blocks()
            && gap > 0.0
            && gap < eps
            && p.x < s.rect.right()
            && p.x + p.w > s.rect.x
    });

    if let Some(s) = seat {
        p.y = s.rect.y - p.h;
        p.on_ground = true;
    }
}

// ══════════════════════════════════════════════════════════════
// 6. Vertical
// ══════════════════════════════════════════════════════════════

/// Returns the index of the mover we landed on, if any.
fn resolve_vertical(world: &mut WorldState, solids: &[Solid]) -> Option<usize> {
    let p = &mut world.player;
    let r = resolve_axis_blocking(p.rect().at(p.x, p.y + p.vy), p.vy, solids, Axis::Vertical);
    p.y = r.pos;
    p.vy = r.velocity;
    if r.landed() {
        p.on_ground = true;
    }
    r.landed_on_mover()
}

// ══════════════════════════════════════════════════════════════
// 7. Carry
// ══════════════════════════════════════════════════════════════

/// Ride the mover's delta for this tick, blocked by whatever else is in
/// the way. Being carried up into a ceiling means we are no longer
/// standing on anything.
fn carry(world: &mut WorldState, solids: &[Solid], riding: Option<usize>) {
    let Some(index) = riding else { return };
    let Some(mover) = world.level.movers.get(index) else { return };
    let (dx, dy) = mover.delta();
    let level_width = world.level.width;
    let p = &mut world.player;

    if dx != 0.0 {
        p.x = sweep_axis(p.rect(), p.x + dx, solids, Axis::Horizontal, level_width).pos;
    }
    if dy != 0.0 {
        let sweep = sweep_axis(p.rect(), p.y + dy, solids, Axis::Vertical, level_width);
        p.y = sweep.pos;
        if dy < 0.0 && sweep.blocked {
            p.on_ground = false;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// 8. Death / contact checks
// ══════════════════════════════════════════════════════════════

/// No bottom border exists; leaving the arena downward is always fatal.
fn fell_into_pit(world: &WorldState) -> bool {
    world.player.rect().bottom() > world.level.height
}

fn touching_hazard(world: &WorldState) -> bool {
    let body = world.player.rect();
    world.active_solids(true)
        .iter()
        .any(|s| s.kind == SolidKind::Hazard && overlaps(&body, &s.rect))
}

fn touching_exit(world: &WorldState) -> Option<&Door> {
    let body = world.player.rect();
    world.level.doors.iter().find(|d| {
        d.kind == DoorKind::Exit
            && d.world.active_in(world.current_world)
            && overlaps(&body, &d.rect)
    })
}
