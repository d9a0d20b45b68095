//! Cellular (Worley) noise over a jittered 3-D lattice.
//!
//! One feature point per unit cell, placed by hashing the cell index. Only the
//! 27 cells around the query are visited, which is exact for F1 and a close
//! approximation for F2.

use crate::seeds::hash3;

/// Distances to the two nearest feature points and their cell hashes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellDatum {
    pub distance: [f64; 2],
    pub id: [u64; 2],
}

impl CellDatum {
    /// Width of the ridge between the two nearest cells (F2 - F1)
    pub fn ridge(&self) -> f64 {
        self.distance[1] - self.distance[0]
    }
}

fn unit(hash: u64, axis: u32) -> f64 {
    ((hash >> (axis * 21)) & 0x1f_ffff) as f64 / (1u64 << 21) as f64
}

/// Sample the cell field seeded with `seed` at `(x, y, z)`
pub fn cell_noise(seed: u64, x: f64, y: f64, z: f64) -> CellDatum {
    let cx = x.floor() as i64;
    let cy = y.floor() as i64;
    let cz = z.floor() as i64;

    let mut distance = [f64::INFINITY; 2];
    let mut id = [0u64; 2];

    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (ix, iy, iz) = (cx + dx, cy + dy, cz + dz);
                let h = hash3(seed, ix, iy, iz);
                let px = ix as f64 + unit(h, 0) - x;
                let py = iy as f64 + unit(h, 1) - y;
                let pz = iz as f64 + unit(h, 2) - z;
                let d = (px * px + py * py + pz * pz).sqrt();

                if d < distance[0] {
                    distance[1] = distance[0];
                    id[1] = id[0];
                    distance[0] = d;
                    id[0] = h;
                } else if d < distance[1] {
                    distance[1] = d;
                    id[1] = h;
                }
            }
        }
    }

    CellDatum { distance, id }
}
