use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    Magma,
    Grayscale,
}

// Sampled from matplotlib's magma at 1/8 intervals.
const MAGMA_STOPS: [[u8; 3]; 9] = [
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

/// 256-entry lookup table mapping a normalized magnitude to RGBA.
#[derive(Clone)]
pub struct ColorLut {
    table: Vec<[u8; 4]>,
}

impl ColorLut {
    pub fn new(map: Colormap) -> Self {
        let table = (0..256)
            .map(|i| {
                let t = i as f32 / 255.0;
                match map {
                    Colormap::Magma => interpolate(&MAGMA_STOPS, t),
                    Colormap::Grayscale => {
                        let v = i as u8;
                        [v, v, v, 255]
                    }
                }
            })
            .collect();
        Self { table }
    }

    #[inline]
    pub fn color(&self, value: f32) -> [u8; 4] {
        let idx = (value.clamp(0.0, 1.0) * 255.0).round() as usize;
        self.table[idx]
    }
}

fn interpolate(stops: &[[u8; 3]], t: f32) -> [u8; 4] {
    let segments = (stops.len() - 1) as f32;
    let pos = t * segments;
    let i = (pos.floor() as usize).min(stops.len() - 2);
    let frac = pos - i as f32;
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    let (a, b) = (stops[i], stops[i + 1]);
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]), 255]
}
