use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

use super::frame::Frame;

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_bytes(bytes: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, font_size })
    }

    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        Self::from_bytes(&bytes, font_size)
    }

    /// Distance from the top of a line to its baseline.
    fn ascent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.font_size)
            .map_or(self.font_size, |m| m.ascent)
    }

    pub fn line_height(&self) -> u32 {
        self.font
            .horizontal_line_metrics(self.font_size)
            .map_or(self.font_size, |m| m.new_line_size)
            .ceil() as u32
    }

    /// Composite text onto an RGBA pixel buffer; `(x, y)` is the top-left of the line box.
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: u32,
        y: u32,
        color: [u8; 4],
    ) {
        let baseline = y as i32 + self.ascent().round() as i32;
        let mut cursor_x = x as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = glyph_top(baseline, metrics.height, metrics.ymin);

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
                    if idx + 3 >= pixels.len() {
                        continue;
                    }

                    let a = alpha as f32 / 255.0 * (color[3] as f32 / 255.0);
                    let inv_a = 1.0 - a;
                    pixels[idx] = (color[0] as f32 * a + pixels[idx] as f32 * inv_a) as u8;
                    pixels[idx + 1] = (color[1] as f32 * a + pixels[idx + 1] as f32 * inv_a) as u8;
                    pixels[idx + 2] = (color[2] as f32 * a + pixels[idx + 2] as f32 * inv_a) as u8;
                    pixels[idx + 3] = 255;
                }
            }

            cursor_x += metrics.advance_width as i32;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let mut width = 0.0f32;
        for ch in text.chars() {
            let metrics = self.font.metrics(ch, self.font_size);
            width += metrics.advance_width;
        }
        width.ceil() as u32
    }
}

/// Top row of a glyph bitmap whose bottom edge sits `ymin` pixels above the baseline.
fn glyph_top(baseline: i32, height: usize, ymin: i32) -> i32 {
    baseline - height as i32 - ymin
}

pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading font from {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch font: {}", url))?
        .error_for_status()
        .with_context(|| format!("Font download failed: {}", url))?;
    let bytes = response.bytes().context("Failed to read font body")?;
    Ok(bytes.to_vec())
}

/// Title in the top-right corner and elapsed time in the bottom-right corner.
pub struct FrameOverlay {
    text: TextOverlay,
    title: Option<String>,
    show_time: bool,
    fps: u32,
}

impl FrameOverlay {
    pub fn new(text: TextOverlay, title: Option<String>, show_time: bool, fps: u32) -> Self {
        Self {
            text,
            title,
            show_time,
            fps,
        }
    }

    pub fn apply(&self, frame: &mut Frame) {
        let color = [255u8, 255, 255, 220];
        let shorter = frame.width.min(frame.height) as f32;
        let margin = (shorter * 0.07) as u32;

        if let Some(ref title) = self.title {
            let tw = self.text.measure_width(title);
            let tx = frame.width.saturating_sub(margin + tw);
            self.text
                .composite(&mut frame.pixels, frame.width, frame.height, title, tx, margin, color);
        }

        if self.show_time {
            let time_str = format_time(frame.index as f64 / self.fps as f64);
            let tw = self.text.measure_width(&time_str);
            let tx = frame.width.saturating_sub(margin + tw);
            let ty = frame
                .height
                .saturating_sub(margin + self.text.line_height());
            self.text
                .composite(&mut frame.pixels, frame.width, frame.height, &time_str, tx, ty, color);
        }
    }
}

pub fn format_time(seconds: f64) -> String {
    let total_secs = seconds as u64;
    let centis = ((seconds - total_secs as f64) * 100.0) as u64;
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
