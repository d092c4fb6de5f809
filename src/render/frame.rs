use super::colormap::{ColorLut, Colormap};
use crate::transform::{FrameData, FrameSpec, ScopePoints, SpectrumGrid};

/// One RGBA8 raster, row-major, `width * height * 4` bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn filled(index: usize, width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = color
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self {
            index,
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    fn put(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = ((y as u32 * self.width + x as u32) * 4) as usize;
        self.pixels[i..i + 4].copy_from_slice(&color);
    }

    pub fn is_uniform(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p == &self.pixels[..4])
    }
}

#[derive(Clone, Debug)]
pub struct RenderStyle {
    pub colormap: Colormap,
    pub background: [u8; 4],
    pub stroke: [u8; 4],
    pub thickness: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            colormap: Colormap::Magma,
            background: [0, 0, 0, 255],
            stroke: [80, 255, 160, 255],
            thickness: 2,
        }
    }
}

/// Maps transform output to rasters. Holds no mutable state, so any number
/// of threads can render arbitrary frames concurrently.
pub struct FrameRenderer {
    pub width: u32,
    pub height: u32,
    lut: ColorLut,
    style: RenderStyle,
}

impl FrameRenderer {
    pub fn new(spec: &FrameSpec, style: RenderStyle) -> Self {
        Self {
            width: spec.width,
            height: spec.height,
            lut: ColorLut::new(style.colormap),
            style,
        }
    }

    pub fn render(&self, data: &FrameData, index: usize) -> Frame {
        match data {
            FrameData::Spectrum(grid) => self.render_spectrum(grid, index),
            FrameData::Scope(points) => self.render_scope(points, index),
        }
    }

    fn render_spectrum(&self, grid: &SpectrumGrid, index: usize) -> Frame {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut frame = Frame::filled(index, self.width, self.height, self.style.background);
        if grid.bins == 0 || grid.columns == 0 {
            return frame;
        }

        let columns: Vec<usize> = (0..w).map(|x| x * grid.columns / w).collect();
        for y in 0..h {
            // Low frequencies at the bottom.
            let bin = (h - 1 - y) * grid.bins / h;
            let row = &grid.values[bin * grid.columns..(bin + 1) * grid.columns];
            let line = &mut frame.pixels[y * w * 4..(y + 1) * w * 4];
            for (px, &col) in line.chunks_exact_mut(4).zip(&columns) {
                px.copy_from_slice(&self.lut.color(row[col]));
            }
        }
        frame
    }

    fn render_scope(&self, scope: &ScopePoints, index: usize) -> Frame {
        let mut frame = Frame::filled(index, self.width, self.height, self.style.background);
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let to_pixel = |[x, y]: [f32; 2]| -> (i64, i64) {
            (
                ((x + 1.0) * 0.5 * max_x).round() as i64,
                ((1.0 - y) * 0.5 * max_y).round() as i64,
            )
        };

        let mut prev: Option<(i64, i64)> = None;
        for &point in &scope.points {
            let cur = to_pixel(point);
            let from = prev.unwrap_or(cur);
            self.stroke_line(&mut frame, from, cur);
            prev = Some(cur);
        }
        frame
    }

    /// Bresenham line with a square brush of `thickness` pixels.
    fn stroke_line(&self, frame: &mut Frame, (x0, y0): (i64, i64), (x1, y1): (i64, i64)) {
        let t = self.style.thickness.max(1) as i64;
        let lo = -(t - 1) / 2;
        let hi = t / 2;

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            for oy in lo..=hi {
                for ox in lo..=hi {
                    frame.put(x + ox, y + oy, self.style.stroke);
                }
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}
