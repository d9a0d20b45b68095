use serde::{Deserialize, Serialize};

use crate::coords::WindowPos;

/// A bounded 2D grid stored in row-major order.
///
/// Unlike an overworld map this never wraps: positions outside the window are
/// simply not addressable, and the checked accessors return `None` for them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    fn index(&self, pos: WindowPos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.y as usize * self.width + pos.x as usize)
        } else {
            None
        }
    }

    pub fn in_bounds(&self, pos: WindowPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Centre of the grid, rounded down
    pub fn center(&self) -> WindowPos {
        WindowPos::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    pub fn get(&self, pos: WindowPos) -> Option<&T> {
        self.index(pos).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, pos: WindowPos) -> Option<&mut T> {
        self.index(pos).map(move |i| &mut self.data[i])
    }

    /// Unchecked accessor for positions already known to be inside the grid.
    pub fn at(&self, pos: WindowPos) -> &T {
        match self.index(pos) {
            Some(i) => &self.data[i],
            None => panic!("{} is outside a {}x{} grid", pos, self.width, self.height),
        }
    }

    pub fn at_mut(&mut self, pos: WindowPos) -> &mut T {
        match self.index(pos) {
            Some(i) => &mut self.data[i],
            None => panic!("{} is outside a {}x{} grid", pos, self.width, self.height),
        }
    }

    /// Set a value; out-of-bounds writes are ignored and reported as `false`.
    pub fn set(&mut self, pos: WindowPos, value: T) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Move a value out of `pos`, leaving `T::default()` behind.
    pub fn take(&mut self, pos: WindowPos) -> Option<T>
    where
        T: Default,
    {
        self.index(pos).map(|i| std::mem::take(&mut self.data[i]))
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// In-bounds 8-connected neighbours.
    pub fn neighbors_8(&self, pos: WindowPos) -> Vec<WindowPos> {
        pos.neighbors_8().filter(|p| self.in_bounds(*p)).collect()
    }

    /// Every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = WindowPos> {
        let width = self.width;
        (0..self.area()).map(move |i| WindowPos::new((i % width) as i32, (i / width) as i32))
    }

    /// Iterate over all cells with their positions.
    pub fn iter(&self) -> impl Iterator<Item = (WindowPos, &T)> {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, val)| (WindowPos::new((i % width) as i32, (i / width) as i32), val))
    }

    /// Iterate mutably over all cells with their positions.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (WindowPos, &mut T)> {
        let width = self.width;
        self.data
            .iter_mut()
            .enumerate()
            .map(move |(i, val)| (WindowPos::new((i % width) as i32, (i / width) as i32), val))
    }

    /// Map every cell into a new grid of the same shape.
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Tilemap<U> {
        Tilemap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl Tilemap<bool> {
    /// Number of `true` cells.
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }
}
