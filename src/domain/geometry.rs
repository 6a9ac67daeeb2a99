/// Axis-aligned rectangles and the one overlap test everything else uses.

/// Top-left anchored box in level pixels.
/// Width and height never change for an entity; only position moves.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Which coordinate a resolve/sweep works on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Same size, moved to `(x, y)`.
    #[inline]
    pub fn at(&self, x: f64, y: f64) -> Rect {
        Rect { x, y, ..*self }
    }

    #[inline]
    pub fn offset(&self, dx: f64, dy: f64) -> Rect {
        self.at(self.x + dx, self.y + dy)
    }

    /// Coordinate along `axis`.
    #[inline]
    pub fn pos(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.x,
            Axis::Vertical => self.y,
        }
    }

    /// Copy with the coordinate along `axis` replaced.
    #[inline]
    pub fn with_pos(&self, axis: Axis, v: f64) -> Rect {
        match axis {
            Axis::Horizontal => self.at(v, self.y),
            Axis::Vertical => self.at(self.x, v),
        }
    }

    /// Extent along `axis`.
    #[inline]
    pub fn extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.w,
            Axis::Vertical => self.h,
        }
    }

    pub fn has_area(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }
}

/// Strict AABB intersection: boxes that only share an edge do not overlap.
#[inline]
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}
