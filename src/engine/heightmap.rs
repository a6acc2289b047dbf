// Terrain height lookup for waypoint placement tooling.
//
// A heightmap is a row-major grid of 8-bit samples stretched over a
// world-space rectangle on the XZ plane. Sample 0 maps to `min_height`
// and 255 to `max_height`. Playback never queries it.

use glam::{UVec2, Vec2, Vec3};

use super::error::{FlythroughError, FlythroughResult};

/// Ground elevation at a world-space XZ position.
pub trait HeightQuery {
    fn height_at(&self, xz: Vec2) -> f32;

    /// Point `clearance` units above the ground at `xz`.
    fn ground_position(&self, xz: Vec2, clearance: f32) -> Vec3 {
        Vec3::new(xz.x, self.height_at(xz) + clearance, xz.y)
    }
}

/// Flat ground at a fixed elevation.
impl HeightQuery for f32 {
    fn height_at(&self, _xz: Vec2) -> f32 {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightmapSettings {
    pub min_height: f32,
    pub max_height: f32,
    /// Extent along world X.
    pub world_width: f32,
    /// Extent along world Z.
    pub world_depth: f32,
    /// World XZ of the grid's (0, 0) corner.
    pub world_origin: Vec2,
}

#[derive(Debug, Clone)]
pub struct Heightmap {
    samples: Vec<u8>,
    size: UVec2,
    settings: HeightmapSettings,
}

impl Heightmap {
    /// Builds from one byte per cell, rows along X, `size_y` rows along Z.
    pub fn from_samples(
        samples: Vec<u8>,
        size_x: u32,
        size_y: u32,
        settings: HeightmapSettings,
    ) -> FlythroughResult<Self> {
        if size_x == 0 || size_y == 0 {
            return Err(FlythroughError::Heightmap(format!(
                "grid size {size_x}x{size_y} is empty"
            )));
        }
        let expected = size_x as usize * size_y as usize;
        if samples.len() != expected {
            return Err(FlythroughError::Heightmap(format!(
                "expected {expected} samples for {size_x}x{size_y}, got {}",
                samples.len()
            )));
        }
        if !(settings.world_width > 0.0 && settings.world_depth > 0.0) {
            return Err(FlythroughError::Heightmap(format!(
                "world extent {}x{} must be positive",
                settings.world_width, settings.world_depth
            )));
        }
        if !(settings.min_height.is_finite()
            && settings.max_height.is_finite()
            && settings.world_origin.is_finite())
        {
            return Err(FlythroughError::Heightmap(
                "height range and origin must be finite".into(),
            ));
        }
        Ok(Self {
            samples,
            size: UVec2::new(size_x, size_y),
            settings,
        })
    }

    /// Builds from RGBA8 pixels, reading the red channel.
    pub fn from_rgba8(
        pixels: &[u8],
        size_x: u32,
        size_y: u32,
        settings: HeightmapSettings,
    ) -> FlythroughResult<Self> {
        if pixels.len() % 4 != 0 {
            return Err(FlythroughError::Heightmap(format!(
                "RGBA buffer length {} is not a multiple of 4",
                pixels.len()
            )));
        }
        let red = pixels.chunks_exact(4).map(|px| px[0]).collect();
        Self::from_samples(red, size_x, size_y, settings)
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn settings(&self) -> &HeightmapSettings {
        &self.settings
    }

    /// Grid cell containing `xz`. Positions outside the rectangle clamp to
    /// the nearest edge cell.
    pub fn world_to_cell_clamped(&self, xz: Vec2) -> UVec2 {
        let extent = Vec2::new(self.settings.world_width, self.settings.world_depth);
        let rel = (xz - self.settings.world_origin).clamp(Vec2::ZERO, extent);
        let cells = self.size.as_vec2() * rel / extent;
        let cx = (cells.x.max(0.0) as u32).min(self.size.x - 1);
        let cy = (cells.y.max(0.0) as u32).min(self.size.y - 1);
        UVec2::new(cx, cy)
    }

    #[inline]
    fn idx(&self, cell: UVec2) -> usize {
        (cell.y * self.size.x + cell.x) as usize
    }

    pub fn sample(&self, cell: UVec2) -> u8 {
        self.samples.get(self.idx(cell)).copied().unwrap_or(0)
    }
}

impl HeightQuery for Heightmap {
    fn height_at(&self, xz: Vec2) -> f32 {
        let sample = self.sample(self.world_to_cell_clamped(xz)) as f32 / 255.0;
        let HeightmapSettings { min_height, max_height, .. } = self.settings;
        min_height + (max_height - min_height) * sample
    }
}
