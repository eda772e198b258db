//! The 240×240 RGB canvas.
//!
//! Pixel writes count marks; the counter is monotonically non-decreasing
//! between clears. Snapshots persist as JSON (pixels base64-packed) and
//! finished drawings export as PNG.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use anima_core::AnimaError;

pub const CANVAS_SIZE: u32 = 240;
const BUFFER_LEN: usize = (CANVAS_SIZE * CANVAS_SIZE * 3) as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pixels: Vec<u8>,
    pixels_drawn: u64,
    era: String,
}

/// Serialized form: pixels packed as base64 so the JSON stays reasonable.
#[derive(Serialize, Deserialize)]
struct CanvasSnapshot {
    era: String,
    pixels_drawn: u64,
    pixels_b64: String,
}

impl Canvas {
    pub fn new(era: &str) -> Self {
        Self {
            pixels: vec![0; BUFFER_LEN],
            pixels_drawn: 0,
            era: era.to_string(),
        }
    }

    pub fn era(&self) -> &str {
        &self.era
    }

    pub fn set_era(&mut self, era: &str) {
        self.era = era.to_string();
    }

    pub fn pixels_drawn(&self) -> u64 {
        self.pixels_drawn
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= CANVAS_SIZE || y >= CANVAS_SIZE {
            return [0; 3];
        }
        let i = ((y * CANVAS_SIZE + x) * 3) as usize;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// Place one mark. Out-of-bounds coordinates are ignored (gestures near
    /// the edge simply fall off).
    pub fn set(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= CANVAS_SIZE || y >= CANVAS_SIZE {
            return;
        }
        let i = ((y * CANVAS_SIZE + x) * 3) as usize;
        self.pixels[i] = color[0];
        self.pixels[i + 1] = color[1];
        self.pixels[i + 2] = color[2];
        self.pixels_drawn += 1;
    }

    /// Additive blend for soft marks.
    pub fn blend(&mut self, x: u32, y: u32, color: [u8; 3], alpha: f32) {
        if x >= CANVAS_SIZE || y >= CANVAS_SIZE {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        let i = ((y * CANVAS_SIZE + x) * 3) as usize;
        for c in 0..3 {
            let old = self.pixels[i + c] as f32;
            self.pixels[i + c] = (old + (color[c] as f32 - old) * alpha).round() as u8;
        }
        self.pixels_drawn += 1;
    }

    /// Fraction of non-black pixels.
    pub fn coverage(&self) -> f32 {
        let drawn = self
            .pixels
            .chunks_exact(3)
            .filter(|p| p[0] > 0 || p[1] > 0 || p[2] > 0)
            .count();
        drawn as f32 / (CANVAS_SIZE * CANVAS_SIZE) as f32
    }

    /// Mean luminance over the whole canvas, [0, 1].
    pub fn mean_luminance(&self) -> f32 {
        let sum: u64 = self
            .pixels
            .chunks_exact(3)
            .map(|p| (p[0] as u64 + p[1] as u64 + p[2] as u64) / 3)
            .sum();
        sum as f32 / (255.0 * (CANVAS_SIZE * CANVAS_SIZE) as f32)
    }

    /// Wipe to black and reset the mark counter.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.pixels_drawn = 0;
    }

    /// Export the current canvas as PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), AnimaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let img = image::RgbImage::from_raw(CANVAS_SIZE, CANVAS_SIZE, self.pixels.clone())
            .ok_or_else(|| AnimaError::Persistence("canvas buffer size mismatch".to_string()))?;
        img.save(path)
            .map_err(|e| AnimaError::Persistence(format!("png save: {e}")))?;
        Ok(())
    }

    /// Persist the working canvas as JSON.
    pub fn save(&self, path: &Path) -> Result<(), AnimaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = CanvasSnapshot {
            era: self.era.clone(),
            pixels_drawn: self.pixels_drawn,
            pixels_b64: base64::engine::general_purpose::STANDARD.encode(&self.pixels),
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, AnimaError> {
        let bytes = fs::read(path)?;
        let snapshot: CanvasSnapshot = serde_json::from_slice(&bytes)?;
        let pixels = base64::engine::general_purpose::STANDARD
            .decode(&snapshot.pixels_b64)
            .map_err(|e| AnimaError::Persistence(format!("canvas decode: {e}")))?;
        if pixels.len() != BUFFER_LEN {
            return Err(AnimaError::Persistence(format!(
                "canvas buffer length {} != {}",
                pixels.len(),
                BUFFER_LEN
            )));
        }
        Ok(Self {
            pixels,
            pixels_drawn: snapshot.pixels_drawn,
            era: snapshot.era,
        })
    }

    pub fn load_or_new(path: &Path, era: &str) -> Self {
        Self::load(path).unwrap_or_else(|_| Self::new(era))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_counts_marks() {
        let mut c = Canvas::new("gestural");
        c.set(10, 10, [255, 100, 50]);
        c.set(10, 10, [200, 90, 40]); // same pixel, still a mark
        assert_eq!(c.pixels_drawn(), 2);
        assert_eq!(c.get(10, 10), [200, 90, 40]);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut c = Canvas::new("gestural");
        c.set(CANVAS_SIZE, 0, [255, 255, 255]);
        c.set(0, CANVAS_SIZE + 5, [255, 255, 255]);
        assert_eq!(c.pixels_drawn(), 0);
    }

    #[test]
    fn test_monotonic_between_clears() {
        let mut c = Canvas::new("field");
        let mut last = 0;
        for i in 0..100 {
            c.set(i % CANVAS_SIZE, (i / CANVAS_SIZE) % CANVAS_SIZE, [10, 5, 0]);
            assert!(c.pixels_drawn() >= last);
            last = c.pixels_drawn();
        }
        c.clear();
        assert_eq!(c.pixels_drawn(), 0);
    }

    #[test]
    fn test_coverage_and_luminance() {
        let mut c = Canvas::new("pointillist");
        assert_eq!(c.coverage(), 0.0);
        for x in 0..CANVAS_SIZE {
            for y in 0..CANVAS_SIZE {
                c.set(x, y, [255, 255, 255]);
            }
        }
        assert!((c.coverage() - 1.0).abs() < 1e-6);
        assert!((c.mean_luminance() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_blend_moves_toward_color() {
        let mut c = Canvas::new("field");
        c.blend(5, 5, [200, 100, 0], 0.5);
        let p = c.get(5, 5);
        assert_eq!(p, [100, 50, 0]);
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.json");
        let mut c = Canvas::new("geometric");
        for i in 0..500 {
            c.set(i % CANVAS_SIZE, i / CANVAS_SIZE, [120, 60, 20]);
        }
        c.save(&path).unwrap();
        let back = Canvas::load(&path).unwrap();
        assert_eq!(back, c);
        assert_eq!(back.era(), "geometric");
        assert_eq!(back.pixels_drawn(), 500);
    }

    #[test]
    fn test_png_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.png");
        let mut c = Canvas::new("gestural");
        c.set(100, 100, [255, 160, 60]);
        c.save_png(&path).unwrap();
        assert!(path.exists());
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }
}
