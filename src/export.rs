//! PNG preview export
//!
//! Quick raster previews for inspecting a tile without the 3D view:
//! heightmap with a spectral colormap, dominant-material map, and the
//! water mask as grayscale.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::raster::Heightmap;
use crate::splat::{MaterialChannel, SplatBuffer};

/// Export a heightmap using a spectral colormap, normalized over the
/// tile's own height range.
pub fn export_heightmap(heightmap: &Heightmap, path: &str) -> Result<(), image::ImageError> {
    let res = heightmap.resolution();
    let mut min_h = f32::MAX;
    let mut max_h = f32::MIN;
    for (_, _, &h) in heightmap.heights.iter() {
        min_h = min_h.min(h);
        max_h = max_h.max(h);
    }
    let range = (max_h - min_h).max(1e-6);

    let mut img: RgbImage = ImageBuffer::new(res as u32, res as u32);
    for z in 0..res {
        for x in 0..res {
            let t = (heightmap.get(x, z) - min_h) / range;
            img.put_pixel(x as u32, z as u32, Rgb(spectral_colormap(t)));
        }
    }
    img.save(path)
}

/// Export the dominant material per splat cell, with water overlaid in
/// blue.
pub fn export_splat(splat: &SplatBuffer, path: &str) -> Result<(), image::ImageError> {
    let res = splat.resolution();
    let mut img: RgbImage = ImageBuffer::new(res as u32, res as u32);
    for z in 0..res {
        for x in 0..res {
            let w = splat.get_weights(x, z);
            let dominant = (0..w.len())
                .max_by(|&a, &b| w[a].total_cmp(&w[b]))
                .unwrap_or(0);
            let mut color = material_color(MaterialChannel::ALL[dominant]);
            let water = splat.get_water(x, z);
            if water > 0.1 {
                color = blend_color(color, [40, 80, 200], water);
            }
            img.put_pixel(x as u32, z as u32, Rgb(color));
        }
    }
    img.save(path)
}

/// Export the water mask as grayscale.
pub fn export_water_mask(splat: &SplatBuffer, path: &str) -> Result<(), image::ImageError> {
    let res = splat.resolution();
    let mut img: RgbImage = ImageBuffer::new(res as u32, res as u32);
    for z in 0..res {
        for x in 0..res {
            let v = (splat.get_water(x, z) * 255.0) as u8;
            img.put_pixel(x as u32, z as u32, Rgb([v, v, v]));
        }
    }
    img.save(path)
}

fn material_color(channel: MaterialChannel) -> [u8; 3] {
    match channel {
        MaterialChannel::Grass => [88, 140, 60],
        MaterialChannel::Dirt => [120, 86, 56],
        MaterialChannel::Rock => [128, 126, 122],
        MaterialChannel::Sand => [214, 196, 142],
    }
}

fn blend_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t) as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t) as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t) as u8,
    ]
}

/// Spectral colormap (matplotlib style): dark blue -> teal -> green ->
/// yellow -> orange -> red.
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t.clamp(0.0, 1.0) * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];
    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colormap_endpoints() {
        let low = spectral_colormap(0.0);
        let high = spectral_colormap(1.0);
        assert_ne!(low, high);
        // Blue-ish at the bottom, red-ish at the top
        assert!(low[2] > low[0]);
        assert!(high[0] > high[2]);
    }

    #[test]
    fn test_colormap_clamps() {
        assert_eq!(spectral_colormap(-1.0), spectral_colormap(0.0));
        assert_eq!(spectral_colormap(2.0), spectral_colormap(1.0));
    }

    #[test]
    fn test_dominant_material_picks_max() {
        let mut splat = SplatBuffer::new(4);
        splat.set_weights(1, 1, [0.1, 0.2, 0.6, 0.1]);
        let w = splat.get_weights(1, 1);
        let dominant = (0..w.len()).max_by(|&a, &b| w[a].total_cmp(&w[b])).unwrap();
        assert_eq!(MaterialChannel::ALL[dominant], MaterialChannel::Rock);
    }
}
