//! Vault template and placement bookkeeping types
//!
//! A vault is a hand-built fragment of level. Once placed it is owned by the
//! [`FragmentRegistry`](super::FragmentRegistry) and every tile it covers
//! carries its [`FragmentId`].

use serde::{Deserialize, Serialize};

use crate::coords::{WindowDelta, WindowPos};
use crate::terrain::Feature;

/// A pre-defined vault template
#[derive(Clone, Debug, PartialEq)]
pub struct VaultTemplate {
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Vec<Feature>>,
    pub tags: Vec<&'static str>,
    /// May only ever be placed once per game
    pub unique: bool,
}

impl VaultTemplate {
    /// Create a new template from a tile grid
    pub fn new(name: &'static str, tiles: Vec<Vec<Feature>>, tags: Vec<&'static str>) -> Self {
        let height = tiles.len();
        let width = if height > 0 { tiles[0].len() } else { 0 };
        Self {
            name,
            width,
            height,
            tiles,
            tags,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Get a tile at local coordinates (returns None if out of bounds)
    pub fn get(&self, x: usize, y: usize) -> Option<Feature> {
        self.tiles.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Check if this template has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }

    /// Rotate the template 90 degrees clockwise
    pub fn rotate_cw(&self) -> Self {
        let new_width = self.height;
        let new_height = self.width;
        let mut new_tiles = vec![vec![Feature::Floor; new_width]; new_height];

        for y in 0..self.height {
            for x in 0..self.width {
                new_tiles[x][self.height - 1 - y] = self.tiles[y][x];
            }
        }

        Self {
            width: new_width,
            height: new_height,
            tiles: new_tiles,
            ..self.clone()
        }
    }

    /// Flip the template horizontally
    pub fn flip_h(&self) -> Self {
        let new_tiles: Vec<Vec<Feature>> = self
            .tiles
            .iter()
            .map(|row| row.iter().rev().copied().collect())
            .collect();

        Self {
            tiles: new_tiles,
            ..self.clone()
        }
    }
}

/// Identifier of a placed fragment, unique within one level instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentId(pub u32);

/// A vault that has been written into the window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedFragment {
    pub id: FragmentId,
    pub name: String,
    /// Top-left corner in the window
    pub origin: WindowPos,
    pub width: usize,
    pub height: usize,
    pub unique: bool,
}

impl PlacedFragment {
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub(crate) fn translate(&mut self, delta: WindowDelta) {
        self.origin = self.origin + delta;
    }
}

/// Why a fragment could not be placed. Always recovered where it happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementError {
    /// No free spot inside the constraint mask after every attempt
    NoRoom,
    /// A unique vault that was already used this game
    UniqueAlreadyUsed(String),
    /// The catalogue has nothing for the requested tag
    NoTemplate(String),
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::NoRoom => write!(f, "no room for vault"),
            PlacementError::UniqueAlreadyUsed(name) => write!(f, "unique vault {} already used", name),
            PlacementError::NoTemplate(tag) => write!(f, "no vault tagged {}", tag),
        }
    }
}

impl std::error::Error for PlacementError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> VaultTemplate {
        use Feature::*;
        VaultTemplate::new(
            "l",
            vec![vec![StoneWall, Floor, Floor], vec![StoneWall, Altar, Floor]],
            vec!["test"],
        )
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let t = l_shape();
        let r = t.rotate_cw();
        assert_eq!((r.width, r.height), (2, 3));
        assert_eq!(r.get(0, 0), Some(Feature::StoneWall));
        assert_eq!(r.get(1, 0), Some(Feature::StoneWall));
        assert_eq!(r.get(0, 1), Some(Feature::Altar));
        assert_eq!(r.rotate_cw().rotate_cw().rotate_cw(), t);
    }

    #[test]
    fn test_flip_keeps_tags() {
        let f = l_shape().flip_h();
        assert_eq!(f.get(2, 0), Some(Feature::StoneWall));
        assert!(f.has_tag("test"));
        assert!(!f.has_tag("abyss"));
    }
}
