//! Coordinate types for the Abyss window.
//!
//! Two spaces are in play: the infinite absolute plane the layouts are sampled
//! on, and the finite window the game actually addresses. The window centre
//! always corresponds to `origin_offset` in absolute space.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Absolute coordinates at or beyond this value on both axes belong to the wastes.
pub const WASTES_THRESHOLD: i64 = 1 << 30;

/// A coordinate in the infinite absolute plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsCoord {
    pub x: i64,
    pub y: i64,
}

impl AbsCoord {
    pub const fn new(x: i64, y: i64) -> Self {
        AbsCoord { x, y }
    }

    /// True when this coordinate lies in the reserved wastes quadrant.
    pub fn in_wastes(&self) -> bool {
        self.x >= WASTES_THRESHOLD && self.y >= WASTES_THRESHOLD
    }

    /// Euclidean distance, in tiles, to another absolute coordinate
    pub fn distance(&self, other: AbsCoord) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        AbsCoord::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for AbsCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.x, self.y)
    }
}

/// A position inside the finite window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowPos {
    pub x: i32,
    pub y: i32,
}

impl WindowPos {
    pub const fn new(x: i32, y: i32) -> Self {
        WindowPos { x, y }
    }

    /// Squared Euclidean distance, used for disk tests without rounding
    pub fn distance_sq(&self, other: WindowPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Chebyshev distance (king moves)
    pub fn grid_distance(&self, other: WindowPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// 8-connected neighbours, unclipped
    pub fn neighbors_8(self) -> impl Iterator<Item = WindowPos> {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dx| {
                if dx == 0 && dy == 0 {
                    None
                } else {
                    Some(WindowPos::new(self.x + dx, self.y + dy))
                }
            })
        })
    }
}

impl Add<WindowDelta> for WindowPos {
    type Output = WindowPos;

    fn add(self, rhs: WindowDelta) -> WindowPos {
        WindowPos::new(self.x + rhs.dx, self.y + rhs.dy)
    }
}

impl Sub for WindowPos {
    type Output = WindowDelta;

    fn sub(self, rhs: WindowPos) -> WindowDelta {
        WindowDelta::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for WindowPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A displacement inside the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowDelta {
    pub dx: i32,
    pub dy: i32,
}

impl WindowDelta {
    pub const ZERO: WindowDelta = WindowDelta { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        WindowDelta { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

impl Neg for WindowDelta {
    type Output = WindowDelta;

    fn neg(self) -> WindowDelta {
        WindowDelta::new(-self.dx, -self.dy)
    }
}

impl Add for WindowDelta {
    type Output = WindowDelta;

    fn add(self, rhs: WindowDelta) -> WindowDelta {
        WindowDelta::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl Add<WindowDelta> for AbsCoord {
    type Output = AbsCoord;

    fn add(self, rhs: WindowDelta) -> AbsCoord {
        AbsCoord::new(self.x + rhs.dx as i64, self.y + rhs.dy as i64)
    }
}
