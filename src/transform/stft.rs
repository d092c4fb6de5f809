use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::{
    centered_window, column_centers, to_unit_db, FrameData, FrameSpec, FrequencyAxis,
    SpectrumGrid, Transform, TransformParams,
};
use crate::audio::AudioBuffer;
use crate::error::{AmusingError, AmusingResult};

/// Short-time Fourier transform with a Hann window and a linear frequency axis.
pub struct Stft {
    audio: Arc<AudioBuffer>,
    spec: FrameSpec,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Converts a raw bin magnitude into the amplitude of a matching sinusoid.
    scale: f32,
    bins: usize,
    max_hz: f32,
    columns: usize,
    span_secs: f32,
    floor_db: f32,
}

impl Stft {
    pub fn new(audio: Arc<AudioBuffer>, spec: FrameSpec, params: &TransformParams) -> AmusingResult<Self> {
        params.validate_grid()?;
        let size = params.fft_size;
        if size < 16 || !size.is_power_of_two() {
            return Err(AmusingError::transform(format!(
                "fft size must be a power of two >= 16, got {}",
                size
            )));
        }

        let sr = audio.sample_rate as f32;
        let nyquist = sr / 2.0;
        let max_hz = params.max_hz.min(nyquist);
        let resolution = sr / size as f32;
        let bins = ((max_hz / resolution).floor() as usize + 1).min(size / 2 + 1);

        let window = hann_window(size);
        let gain: f32 = window.iter().sum();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);

        log::debug!(
            "STFT: size={}, bins={} (0-{:.0}Hz, {:.2}Hz/bin), columns={}",
            size,
            bins,
            max_hz,
            resolution,
            params.columns
        );

        Ok(Self {
            audio,
            spec,
            fft,
            window,
            scale: 2.0 / gain,
            bins,
            max_hz: (bins - 1) as f32 * resolution,
            columns: params.columns,
            span_secs: params.span_secs,
            floor_db: params.floor_db,
        })
    }

    fn column(&self, center: i64, out: &mut [Complex<f32>]) {
        let segment = centered_window(&self.audio.samples, center, self.window.len());
        for (i, (s, w)) in segment.iter().zip(&self.window).enumerate() {
            out[i] = Complex::new(s * w, 0.0);
        }
        self.fft.process(out);
    }
}

impl Transform for Stft {
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

        let mut values = vec![0.0f32; self.bins * self.columns];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.window.len()];
        for (col, &center) in centers.iter().enumerate() {
            self.column(center, &mut buffer);
            for bin in 0..self.bins {
                values[bin * self.columns + col] =
                    to_unit_db(buffer[bin].norm() * self.scale, self.floor_db);
            }
        }

        Ok(FrameData::Spectrum(SpectrumGrid {
            bins: self.bins,
            columns: self.columns,
            values,
            axis: FrequencyAxis::Linear { max_hz: self.max_hz },
        }))
    }
}

pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
