use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

/// CPU text compositing onto read-back RGBA frames.
pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        Self::from_bytes(&bytes, font_size)
            .with_context(|| format!("Failed to load font: {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(anyhow::Error::msg)?;
        Ok(Self { font, font_size })
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }

    /// Alpha-blend `text` onto `pixels` with its top-left corner at (x, y).
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        (x, y): (u32, u32),
        color: [u8; 4],
    ) {
        let mut cursor_x = x as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y as i32 + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }
                    let px = cursor_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }
                    let idx = ((py as u32 * width + px as u32) * 4) as usize;
                    if let Some(dst) = pixels.get_mut(idx..idx + 4) {
                        blend(dst, color, alpha);
                    }
                }
            }

            cursor_x += metrics.advance_width as i32;
        }
    }

    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

fn blend(dst: &mut [u8], color: [u8; 4], coverage: u8) {
    let a = coverage as f32 / 255.0 * (color[3] as f32 / 255.0);
    let inv_a = 1.0 - a;
    for c in 0..3 {
        dst[c] = (color[c] as f32 * a + dst[c] as f32 * inv_a) as u8;
    }
    dst[3] = 255;
}

/// `MM:SS.cc`, or `HH:MM:SS.cc` past the hour.
pub fn format_elapsed(seconds: f32) -> String {
    let seconds = seconds.max(0.0);
    let total_secs = seconds as u64;
    let centis = ((seconds - total_secs as f32) * 100.0) as u64;
    if total_secs >= 3600 {
        format!(
            "{:02}:{:02}:{:02}.{:02}",
            total_secs / 3600,
            (total_secs % 3600) / 60,
            total_secs % 60,
            centis
        )
    } else {
        format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis)
    }
}
