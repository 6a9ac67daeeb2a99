/// Mover kinematics.
///
/// A mover's position is a pure function of elapsed level time:
///
/// ```text
///   t   = (elapsed mod cycle) / cycle          in [0, 1)
///   u   = t <= 0.5 ? 2t : 2(1 - t)             ping-pong fold
///   pos = from + u * (to - from)               along the mover's axis
/// ```
///
/// Nothing is integrated, so the same `elapsed` always gives the same
/// position and a reset to time 0 puts every mover back exactly.
/// Each update keeps the previous position so push/carry can read a
/// per-frame delta.

use super::entity::WorldTag;
use super::geometry::{Axis, Rect};

#[derive(Clone, Debug, PartialEq)]
pub struct Mover {
    pub id: String,
    /// Current position; `w`/`h` are fixed.
    pub rect: Rect,
    pub world: WorldTag,
    pub axis: Axis,
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub cycle_ms: f64,
    /// Position at the previous evaluation.
    pub prev: (f64, f64),
}

/// Ping-pong fold of a cycle phase `t` in [0, 1).
#[inline]
pub fn ping_pong(t: f64) -> f64 {
    if t <= 0.5 { 2.0 * t } else { 2.0 * (1.0 - t) }
}

/// Cycle phase of `elapsed_ms` in [0, 1).
#[inline]
pub fn cycle_phase(elapsed_ms: f64, cycle_ms: f64) -> f64 {
    elapsed_ms.rem_euclid(cycle_ms) / cycle_ms
}

impl Mover {
    /// New mover resting at its time-0 position with zero delta.
    pub fn new(
        id: impl Into<String>,
        w: f64,
        h: f64,
        world: WorldTag,
        axis: Axis,
        from: (f64, f64),
        to: (f64, f64),
        cycle_ms: f64,
    ) -> Self {
        let mut m = Mover {
            id: id.into(),
            rect: Rect::new(from.0, from.1, w, h),
            world,
            axis,
            from,
            to,
            cycle_ms,
            prev: from,
        };
        m.settle(0.0);
        m
    }

    /// Position at `elapsed_ms`. Only the coordinate on the mover's axis
    /// travels; the other stays at `from`.
    pub fn position_at(&self, elapsed_ms: f64) -> (f64, f64) {
        let u = ping_pong(cycle_phase(elapsed_ms, self.cycle_ms));
        match self.axis {
            Axis::Horizontal => (self.from.0 + u * (self.to.0 - self.from.0), self.from.1),
            Axis::Vertical => (self.from.0, self.from.1 + u * (self.to.1 - self.from.1)),
        }
    }

    /// Advance to `elapsed_ms`, remembering where we were.
    pub fn update(&mut self, elapsed_ms: f64) {
        self.prev = (self.rect.x, self.rect.y);
        let (x, y) = self.position_at(elapsed_ms);
        self.rect.x = x;
        self.rect.y = y;
    }

    /// Jump to `elapsed_ms` with a zero delta (level load / reset), so
    /// the first frame never produces a spurious push.
    pub fn settle(&mut self, elapsed_ms: f64) {
        let (x, y) = self.position_at(elapsed_ms);
        self.rect.x = x;
        self.rect.y = y;
        self.prev = (x, y);
    }

    /// Displacement since the previous evaluation.
    #[inline]
    pub fn delta(&self) -> (f64, f64) {
        (self.rect.x - self.prev.0, self.rect.y - self.prev.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shuttle() -> Mover {
        Mover::new(
            "shuttle", 80.0, 12.0, WorldTag::Both, Axis::Horizontal,
            (900.0, 280.0), (1050.0, 280.0), 3000.0,
        )
    }

    fn lift() -> Mover {
        Mover::new(
            "lift", 60.0, 12.0, WorldTag::Light, Axis::Vertical,
            (1600.0, 200.0), (1600.0, 300.0), 4000.0,
        )
    }

    #[test]
    fn fold_quarter_points() {
        // cycle 1000: 0 → from, 250 → midpoint, 500 → to, 750 → midpoint
        assert_eq!(ping_pong(cycle_phase(0.0, 1000.0)), 0.0);
        assert_eq!(ping_pong(cycle_phase(250.0, 1000.0)), 0.5);
        assert_eq!(ping_pong(cycle_phase(500.0, 1000.0)), 1.0);
        assert_eq!(ping_pong(cycle_phase(750.0, 1000.0)), 0.5);
        let near_end = ping_pong(cycle_phase(999.999, 1000.0));
        assert!(near_end > 0.0 && near_end < 1e-5);
    }

    #[test]
    fn position_is_pure() {
        let m = shuttle();
        let a = m.position_at(1234.5);
        let b = m.position_at(1234.5);
        assert_eq!(a.0.to_bits(), b.0.to_bits());
        assert_eq!(a.1.to_bits(), b.1.to_bits());
    }

    #[test]
    fn position_is_periodic() {
        let m = lift();
        let base = m.position_at(1234.5);
        for k in 1..5 {
            assert_eq!(m.position_at(1234.5 + k as f64 * m.cycle_ms), base);
        }
    }

    #[test]
    fn endpoints_and_midpoint() {
        let m = shuttle();
        assert_eq!(m.position_at(0.0), (900.0, 280.0));
        assert_eq!(m.position_at(750.0), (975.0, 280.0));
        assert_eq!(m.position_at(1500.0), (1050.0, 280.0));
        assert_eq!(m.position_at(2250.0), (975.0, 280.0));
    }

    #[test]
    fn vertical_mover_keeps_x() {
        let m = lift();
        let (x, y) = m.position_at(1000.0);
        assert_eq!(x, 1600.0);
        assert_eq!(y, 250.0);
    }

    #[test]
    fn update_records_delta() {
        let mut m = shuttle();
        assert_eq!(m.delta(), (0.0, 0.0));
        m.update(300.0);
        let (dx, dy) = m.delta();
        assert!((dx - 30.0).abs() < 1e-9);
        assert_eq!(dy, 0.0);
        assert_eq!(m.prev, (900.0, 280.0));
    }

    #[test]
    fn settle_zeroes_delta() {
        let mut m = shuttle();
        m.update(600.0);
        m.settle(0.0);
        assert_eq!(m.delta(), (0.0, 0.0));
        assert_eq!((m.rect.x, m.rect.y), (900.0, 280.0));
    }
}
