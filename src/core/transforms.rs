//! Color mapping and shading for elevation fields.
//!
//! Colormaps are piecewise-linear over a few control points. A plain color
//! turns into a white-to-color gradient. Per-value mapping is parallelized
//! using Rayon.

use std::fmt;

use ndarray::Array2;
use rayon::prelude::*;

/// Fallback used when a colormap name or color cannot be parsed.
pub const DEFAULT_COLORMAP: Colormap = Colormap::Coolwarm;

const COOLWARM: &[(f32, [u8; 3])] = &[
    (0.0, [59, 76, 192]),
    (0.25, [141, 176, 254]),
    (0.5, [221, 221, 221]),
    (0.75, [244, 154, 123]),
    (1.0, [180, 4, 38]),
];

const VIRIDIS: &[(f32, [u8; 3])] = &[
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

const GRAYSCALE: &[(f32, [u8; 3])] = &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])];

const WHITE: [u8; 3] = [255, 255, 255];

/// Basic color names accepted in place of a hex code.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("brown", [165, 42, 42]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// Mapping from `[0, 1]` to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Diverging blue to red
    Coolwarm,
    /// Perceptually uniform purple to yellow
    Viridis,
    /// Black to white
    Grayscale,
    /// Linear blend between two colors
    Gradient { from: [u8; 3], to: [u8; 3] },
}

impl Default for Colormap {
    fn default() -> Self {
        DEFAULT_COLORMAP
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Colormap::Coolwarm => write!(f, "coolwarm"),
            Colormap::Viridis => write!(f, "viridis"),
            Colormap::Grayscale => write!(f, "grayscale"),
            Colormap::Gradient { from, to } => write!(
                f,
                "#{:02x}{:02x}{:02x}->#{:02x}{:02x}{:02x}",
                from[0], from[1], from[2], to[0], to[1], to[2]
            ),
        }
    }
}

impl Colormap {
    /// Parse a colormap name or a color.
    ///
    /// Names: `coolwarm`, `viridis`, `grayscale`/`greys`. Colors: `#RRGGBB`,
    /// `RRGGBB` or a basic color name; a color yields a white-to-color
    /// gradient. Returns `None` if the value is neither.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "coolwarm" => return Some(Colormap::Coolwarm),
            "viridis" => return Some(Colormap::Viridis),
            "grayscale" | "greys" | "gray_r" => return Some(Colormap::Grayscale),
            _ => {}
        }

        parse_color(input).map(|to| Colormap::Gradient { from: WHITE, to })
    }

    /// Parse a colormap, falling back to the default with a warning.
    pub fn parse_or_default(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|| {
            log::warn!(
                "Invalid color or colormap: {}. Using {}.",
                input,
                DEFAULT_COLORMAP
            );
            DEFAULT_COLORMAP
        })
    }

    /// Color at position `t`, clamped to `[0, 1]`.
    pub fn sample(&self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Colormap::Coolwarm => interpolate(COOLWARM, t),
            Colormap::Viridis => interpolate(VIRIDIS, t),
            Colormap::Grayscale => interpolate(GRAYSCALE, t),
            Colormap::Gradient { from, to } => lerp_rgb(*from, *to, t),
        }
    }
}

/// Parse `#RRGGBB`, `RRGGBB` or a basic color name.
pub fn parse_color(input: &str) -> Option<[u8; 3]> {
    let lower = input.trim().to_ascii_lowercase();
    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Some(*rgb);
    }

    let hex = lower.strip_prefix('#').unwrap_or(&lower);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

fn interpolate(stops: &[(f32, [u8; 3])], t: f32) -> [u8; 3] {
    for pair in stops.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let local = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            return lerp_rgb(c0, c1, local);
        }
    }
    stops.last().map_or(WHITE, |&(_, c)| c)
}

/// Map elevation values to colors.
pub fn elevation_to_colors(values: &[f32], colormap: &Colormap) -> Vec<[u8; 3]> {
    values.par_iter().map(|&v| colormap.sample(v)).collect()
}

/// Scale a color by a shade factor in `[0, 1]`.
#[inline]
pub fn shade_color(color: [u8; 3], factor: f32) -> [u8; 3] {
    let f = factor.clamp(0.0, 1.0);
    [
        (color[0] as f32 * f).round() as u8,
        (color[1] as f32 * f).round() as u8,
        (color[2] as f32 * f).round() as u8,
    ]
}

/// Directional light for relief shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Direction pointing toward the light (normalized on use)
    pub direction: [f32; 3],
    pub intensity: f32,
    pub ambient: f32,
}

impl Default for Light {
    fn default() -> Self {
        // Straight overhead
        Self {
            direction: [0.0, 0.0, 1.0],
            intensity: 0.7,
            ambient: 0.35,
        }
    }
}

/// Lambertian shade factor for every cell of a height grid.
///
/// Normals come from central differences (one-sided on the border). The
/// factor is `ambient + intensity * max(0, n . l)`, clamped to `[0, 1]`.
pub fn hillshade(heights: &Array2<f32>, light: &Light) -> Array2<f32> {
    let (rows, cols) = heights.dim();
    let [lx, ly, lz] = light.direction;
    let norm = (lx * lx + ly * ly + lz * lz).sqrt().max(f32::EPSILON);
    let l = [lx / norm, ly / norm, lz / norm];

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let left = heights[[r, c.saturating_sub(1)]];
        let right = heights[[r, (c + 1).min(cols - 1)]];
        let up = heights[[r.saturating_sub(1), c]];
        let down = heights[[(r + 1).min(rows - 1), c]];

        let dx_span = ((c + 1).min(cols - 1) - c.saturating_sub(1)).max(1) as f32;
        let dy_span = ((r + 1).min(rows - 1) - r.saturating_sub(1)).max(1) as f32;
        let dzdx = (right - left) / dx_span;
        // Row index grows downward, world Y grows upward
        let dzdy = (up - down) / dy_span;

        let n = [-dzdx, -dzdy, 1.0];
        let n_len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let lambert = ((n[0] * l[0] + n[1] * l[1] + n[2] * l[2]) / n_len).max(0.0);

        (light.ambient + light.intensity * lambert).clamp(0.0, 1.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(Colormap::Coolwarm.sample(0.0), [59, 76, 192]);
        assert_eq!(Colormap::Coolwarm.sample(1.0), [180, 4, 38]);
        assert_eq!(Colormap::Coolwarm.sample(0.5), [221, 221, 221]);
        assert_eq!(Colormap::Grayscale.sample(0.0), [0, 0, 0]);
        assert_eq!(Colormap::Grayscale.sample(1.0), [255, 255, 255]);
    }

    #[test]
    fn test_sample_clamps() {
        assert_eq!(Colormap::Viridis.sample(-3.0), Colormap::Viridis.sample(0.0));
        assert_eq!(Colormap::Viridis.sample(7.0), Colormap::Viridis.sample(1.0));
        assert_eq!(Colormap::Viridis.sample(f32::NAN), Colormap::Viridis.sample(0.0));
    }

    #[test]
    fn test_parse_names_and_colors() {
        assert_eq!(Colormap::parse("coolwarm"), Some(Colormap::Coolwarm));
        assert_eq!(Colormap::parse("Viridis"), Some(Colormap::Viridis));
        assert_eq!(
            Colormap::parse("#ff8000"),
            Some(Colormap::Gradient { from: [255, 255, 255], to: [255, 128, 0] })
        );
        assert_eq!(
            Colormap::parse("red"),
            Some(Colormap::Gradient { from: [255, 255, 255], to: [255, 0, 0] })
        );
        assert_eq!(Colormap::parse("not-a-color"), None);
        assert_eq!(Colormap::parse("#12345"), None);
    }

    #[test]
    fn test_parse_or_default_falls_back() {
        assert_eq!(Colormap::parse_or_default("???"), Colormap::Coolwarm);
    }

    #[test]
    fn test_gradient_starts_white() {
        let cmap = Colormap::parse("0000ff").unwrap();
        assert_eq!(cmap.sample(0.0), [255, 255, 255]);
        assert_eq!(cmap.sample(1.0), [0, 0, 255]);
        assert_eq!(cmap.sample(0.5), [128, 128, 255]);
    }

    #[test]
    fn test_elevation_to_colors() {
        let colors = elevation_to_colors(&[0.0, 1.0], &Colormap::Grayscale);
        assert_eq!(colors, vec![[0, 0, 0], [255, 255, 255]]);
    }

    #[test]
    fn test_shade_color() {
        assert_eq!(shade_color([200, 100, 50], 0.5), [100, 50, 25]);
        assert_eq!(shade_color([200, 100, 50], 2.0), [200, 100, 50]);
    }

    #[test]
    fn test_hillshade_flat_and_slope() {
        let light = Light::default();
        let flat = Array2::from_elem((3, 3), 5.0f32);
        let shade = hillshade(&flat, &light);
        for &v in shade.iter() {
            assert!((v - 1.0).abs() < 1e-6, "flat overhead-lit should saturate, got {}", v);
        }

        let slope = Array2::from_shape_fn((3, 3), |(_, c)| c as f32 * 10.0);
        let shade = hillshade(&slope, &light);
        assert!(shade[[1, 1]] < 1.0);
        assert!(shade[[1, 1]] >= light.ambient);
    }
}
