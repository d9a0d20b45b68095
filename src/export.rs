//! ASCII and PNG rendering of the Abyss window.

use std::fs::File;
use std::io::{self, Write};

use image::{ImageBuffer, Rgb, RgbImage};

use crate::abyss::Abyss;
use crate::coords::WindowPos;
use crate::population::Population;

const PLAYER_COLOR: [u8; 3] = [255, 255, 255];
const MONSTER_COLOR: [u8; 3] = [220, 40, 40];
const ITEM_COLOR: [u8; 3] = [240, 200, 60];
const CLOUD_COLOR: [u8; 3] = [150, 150, 170];

/// Character shown for one window position, top layer first:
/// player, monster, item, cloud, terrain.
fn glyph(abyss: &Abyss, population: &dyn Population, pos: WindowPos) -> char {
    if pos == abyss.player_pos() {
        return '@';
    }
    if let Some(monster) = population.monster_at(pos) {
        return monster.kind.chars().next().unwrap_or('M');
    }
    if let Some(item) = population.items_at(pos).first() {
        return item.category.ascii_char();
    }
    let Some(tile) = abyss.tile(pos) else { return ' ' };
    match tile.cloud {
        Some(cloud) if !tile.feature.is_solid() => cloud.kind.ascii_char(),
        _ => tile.feature.ascii_char(),
    }
}

/// Render the window as text, one line per row
pub fn render_ascii(abyss: &Abyss, population: &dyn Population) -> String {
    let grid = abyss.grid();
    let mut out = String::with_capacity((grid.width + 1) * grid.height);
    for y in 0..grid.height as i32 {
        for x in 0..grid.width as i32 {
            out.push(glyph(abyss, population, WindowPos::new(x, y)));
        }
        out.push('\n');
    }
    out
}

/// Write the ASCII rendering plus a short header to `path`
pub fn export_ascii(abyss: &Abyss, population: &dyn Population, path: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    let state = abyss.state();
    writeln!(file, "# Abyss seed {} level {}", state.seed, abyss.progress().abyss_level)?;
    writeln!(file, "# origin {} depth {} phase {:.3}", state.origin_offset, state.depth, state.phase)?;
    file.write_all(render_ascii(abyss, population).as_bytes())?;
    Ok(())
}

/// Export the window as a PNG with `scale` pixels per tile
pub fn export_png(
    abyss: &Abyss,
    population: &dyn Population,
    path: &str,
    scale: u32,
) -> Result<(), image::ImageError> {
    render_image(abyss, population, scale).save(path)
}

pub fn render_image(abyss: &Abyss, population: &dyn Population, scale: u32) -> RgbImage {
    let grid = abyss.grid();
    let scale = scale.max(1);
    let mut img: RgbImage = ImageBuffer::new(grid.width as u32 * scale, grid.height as u32 * scale);

    for (pos, tile) in grid.iter() {
        let (r, g, b) = tile.feature.color();
        let mut color = [r, g, b];
        if tile.cloud.is_some() && !tile.feature.is_solid() {
            color = blend(color, CLOUD_COLOR, 0.5);
        }
        if !population.items_at(pos).is_empty() {
            color = ITEM_COLOR;
        }
        if population.monster_at(pos).is_some() {
            color = MONSTER_COLOR;
        }
        if pos == abyss.player_pos() {
            color = PLAYER_COLOR;
        }

        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(pos.x as u32 * scale + dx, pos.y as u32 * scale + dy, Rgb(color));
            }
        }
    }
    img
}

fn blend(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}
