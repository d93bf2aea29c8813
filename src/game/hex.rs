//! Hexagonal coordinate system using offset coordinates (odd-r).
//!
//! Based on Red Blob Games' guide:
//! https://www.redblobgames.com/grids/hexagons/
//!
//! We use "pointy-top" orientation with "odd-r" offset coordinates, but with
//! rows growing *upward*: the ceiling sits on the highest rows and the board
//! grows down into negative rows as bubbles are added below it. Odd rows are
//! shifted right by half a cell.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Square root of 3, used frequently in hex math.
pub const SQRT_3: f32 = 1.732_050_8;

/// Neighbor offsets for a cell on an even row, counter-clockwise from east.
const EVEN_NEIGHBORS: [HexCoord; 6] = [
    HexCoord::new(1, 0),   // East
    HexCoord::new(0, 1),   // Northeast
    HexCoord::new(-1, 1),  // Northwest
    HexCoord::new(-1, 0),  // West
    HexCoord::new(-1, -1), // Southwest
    HexCoord::new(0, -1),  // Southeast
];

/// Neighbor offsets for a cell on an odd row.
///
/// Same directions as [`EVEN_NEIGHBORS`], with every diagonal shifted one
/// column right.
const ODD_NEIGHBORS: [HexCoord; 6] = [
    HexCoord::new(1, 0),  // East
    HexCoord::new(1, 1),  // Northeast
    HexCoord::new(0, 1),  // Northwest
    HexCoord::new(-1, 0), // West
    HexCoord::new(0, -1), // Southwest
    HexCoord::new(1, -1), // Southeast
];

/// Offset hex coordinate (odd-r system).
///
/// - `col` increases to the right
/// - `row` increases upward
/// - Odd rows are shifted right by half a cell
///
/// Serialized as a `[col, row]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct HexCoord {
    pub col: i32,
    pub row: i32,
}

impl HexCoord {
    /// Create a new hex coordinate.
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    #[inline]
    pub const fn is_odd_row(&self) -> bool {
        self.row % 2 != 0
    }

    /// The six relative neighbor offsets for this coordinate's row parity.
    pub fn neighbor_offsets(&self) -> &'static [HexCoord; 6] {
        if self.is_odd_row() {
            &ODD_NEIGHBORS
        } else {
            &EVEN_NEIGHBORS
        }
    }

    /// Get all 6 neighboring hex coordinates.
    ///
    /// In offset coordinates (odd-r), neighbors depend on row parity.
    pub fn neighbors(&self) -> [HexCoord; 6] {
        let offsets = *self.neighbor_offsets();
        offsets.map(|offset| *self + offset)
    }

    /// Re-express an offset authored for an even row so it lands on the same
    /// relative cells when anchored on `anchor`'s row.
    ///
    /// This is the rule that turns [`EVEN_NEIGHBORS`] into [`ODD_NEIGHBORS`],
    /// so any footprint (explosion shapes, previews) mirrors exactly like the
    /// neighbor table does.
    pub fn mirrored_for(self, anchor: HexCoord) -> HexCoord {
        if anchor.is_odd_row() && self.is_odd_row() {
            HexCoord::new(self.col + 1, self.row)
        } else {
            self
        }
    }

    /// Whether `other` is one of the six neighbors of this cell.
    pub fn is_adjacent(&self, other: HexCoord) -> bool {
        self.neighbors().contains(&other)
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

impl std::ops::Add for HexCoord {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        HexCoord::new(self.col + other.col, self.row + other.row)
    }
}

impl std::ops::Sub for HexCoord {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        HexCoord::new(self.col - other.col, self.row - other.row)
    }
}

impl From<(i32, i32)> for HexCoord {
    fn from((col, row): (i32, i32)) -> Self {
        Self::new(col, row)
    }
}

impl From<HexCoord> for (i32, i32) {
    fn from(coord: HexCoord) -> Self {
        (coord.col, coord.row)
    }
}

/// World-space geometry of the lattice.
///
/// The scroll offset is applied on top of this by the world context, so the
/// layout itself never changes during a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexLayout {
    /// Horizontal distance between two cells on the same row.
    pub cell_width: f32,
    /// Vertical distance between two consecutive rows.
    pub row_height: f32,
    /// World position of cell `(0, 0)`.
    pub origin: Vec2,
}

impl Default for HexLayout {
    fn default() -> Self {
        // Unit-diameter bubbles packed edge to edge.
        Self {
            cell_width: 1.0,
            row_height: SQRT_3 * 0.5,
            origin: Vec2::ZERO,
        }
    }
}

impl HexLayout {
    /// Convert an offset coordinate to its world position (without scroll).
    pub fn to_world(&self, coord: HexCoord) -> Vec2 {
        // Odd rows shift right by half a cell
        let row_offset = if coord.is_odd_row() { 0.5 } else { 0.0 };
        let x = self.cell_width * (coord.col as f32 + row_offset);
        let y = self.row_height * coord.row as f32;
        self.origin + Vec2::new(x, y)
    }
}
