use rustfft::num_complex::Complex;
use std::sync::Arc;

use super::{
    column_centers, sample_at, to_unit_db, FrameData, FrameSpec, FrequencyAxis, SpectrumGrid,
    Transform, TransformParams,
};
use crate::audio::AudioBuffer;
use crate::error::{AmusingError, AmusingResult};

/// Sampled complex Morlet wavelet for one center frequency, stored from `-half` to `+half`.
struct Kernel {
    half: i64,
    taps: Vec<Complex<f32>>,
}

impl Kernel {
    fn new(freq: f32, sample_rate: u32, cycles: f32, max_support_secs: f32) -> Self {
        let sr = sample_rate as f32;
        let sigma = cycles / (2.0 * std::f32::consts::PI * freq);
        let half = (3.0 * sigma * sr).ceil().min((max_support_secs * sr).ceil()).max(1.0) as i64;

        let mut taps = Vec::with_capacity((2 * half + 1) as usize);
        let mut gain = 0.0f32;
        for n in -half..=half {
            let t = n as f32 / sr;
            let g = (-(t * t) / (2.0 * sigma * sigma)).exp();
            let phase = -2.0 * std::f32::consts::PI * freq * t;
            gain += g;
            taps.push(Complex::from_polar(g, phase));
        }
        // A sinusoid of amplitude A correlates to A * gain / 2.
        let scale = 2.0 / gain;
        for tap in &mut taps {
            *tap *= scale;
        }
        Self { half, taps }
    }

    fn magnitude(&self, samples: &[f32], center: i64) -> f32 {
        let start = center - self.half;
        let mut acc = Complex::new(0.0f32, 0.0);
        if start >= 0 && (start as usize + self.taps.len()) <= samples.len() {
            let slice = &samples[start as usize..start as usize + self.taps.len()];
            for (s, k) in slice.iter().zip(&self.taps) {
                acc += *k * *s;
            }
        } else {
            for (i, k) in self.taps.iter().enumerate() {
                acc += *k * sample_at(samples, start + i as i64);
            }
        }
        acc.norm()
    }
}

/// Continuous wavelet transform on a geometric frequency grid (constant Q).
pub struct Morlet {
    audio: Arc<AudioBuffer>,
    spec: FrameSpec,
    kernels: Vec<Kernel>,
    min_hz: f32,
    max_hz: f32,
    columns: usize,
    span_secs: f32,
    floor_db: f32,
}

impl Morlet {
    pub fn new(audio: Arc<AudioBuffer>, spec: FrameSpec, params: &TransformParams) -> AmusingResult<Self> {
        params.validate_grid()?;
        if params.bins == 0 {
            return Err(AmusingError::transform("bin count must be positive"));
        }
        if !(params.cycles > 0.0) || !(params.max_support_secs > 0.0) {
            return Err(AmusingError::transform(
                "wavelet cycles and support must be positive",
            ));
        }

        let nyquist = audio.sample_rate as f32 / 2.0;
        let max_hz = params.max_hz.min(nyquist);
        let min_hz = params.min_hz;
        if !(min_hz > 0.0) || min_hz >= max_hz {
            return Err(AmusingError::transform(format!(
                "frequency range must satisfy 0 < min < max <= nyquist, got {}-{}Hz",
                min_hz, max_hz
            )));
        }

        let kernels: Vec<Kernel> = center_frequencies(min_hz, max_hz, params.bins)
            .into_iter()
            .map(|f| Kernel::new(f, audio.sample_rate, params.cycles, params.max_support_secs))
            .collect();

        log::debug!(
            "Morlet: {} bins {:.0}-{:.0}Hz, {} cycles, widest kernel {} taps",
            kernels.len(),
            min_hz,
            max_hz,
            params.cycles,
            kernels.first().map_or(0, |k| k.taps.len())
        );

        Ok(Self {
            audio,
            spec,
            kernels,
            min_hz,
            max_hz,
            columns: params.columns,
            span_secs: params.span_secs,
            floor_db: params.floor_db,
        })
    }
}

impl Transform for Morlet {
    fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    fn compute_frame(&self, index: i64) -> AmusingResult<FrameData> {
        let index = self.spec.check_index(index)?;
        let centers = column_centers(
            &self.spec,
            index,
            self.audio.sample_rate,
            self.columns,
            self.span_secs,
        );

        let bins = self.kernels.len();
        let mut values = vec![0.0f32; bins * self.columns];
        for (bin, kernel) in self.kernels.iter().enumerate() {
            let row = &mut values[bin * self.columns..(bin + 1) * self.columns];
            for (cell, &center) in row.iter_mut().zip(&centers) {
                *cell = to_unit_db(kernel.magnitude(&self.audio.samples, center), self.floor_db);
            }
        }

        Ok(FrameData::Spectrum(SpectrumGrid {
            bins,
            columns: self.columns,
            values,
            axis: FrequencyAxis::Logarithmic {
                min_hz: self.min_hz,
                max_hz: self.max_hz,
            },
        }))
    }
}

/// `bins` frequencies spaced geometrically from `min_hz` to `max_hz`, ascending.
pub fn center_frequencies(min_hz: f32, max_hz: f32, bins: usize) -> Vec<f32> {
    if bins == 1 {
        return vec![min_hz];
    }
    let ratio = (max_hz / min_hz).ln();
    (0..bins)
        .map(|k| min_hz * (ratio * k as f32 / (bins - 1) as f32).exp())
        .collect()
}
