pub mod morlet;
pub mod scope;
pub mod stft;

use serde::Deserialize;
use std::sync::Arc;

use crate::audio::AudioBuffer;
use crate::error::{AmusingError, AmusingResult};

/// Output geometry and timing shared by every stage of the audio pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSpec {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
}

impl FrameSpec {
    pub fn new(fps: u32, width: u32, height: u32, frame_count: usize) -> AmusingResult<Self> {
        if fps == 0 {
            return Err(AmusingError::transform("fps must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(AmusingError::transform(format!(
                "frame size must be positive, got {}x{}",
                width, height
            )));
        }
        if frame_count == 0 {
            return Err(AmusingError::transform(
                "frame count must be at least 1 (audio shorter than half a frame?)",
            ));
        }
        Ok(Self {
            fps,
            width,
            height,
            frame_count,
        })
    }

    /// Frame count is `round(duration * fps)`.
    pub fn for_audio(audio: &AudioBuffer, fps: u32, width: u32, height: u32) -> AmusingResult<Self> {
        let frame_count = (audio.duration() * fps as f64).round() as usize;
        Self::new(fps, width, height, frame_count)
    }

    pub fn frame_time(&self, index: usize) -> f64 {
        index as f64 / self.fps as f64
    }

    pub fn check_index(&self, index: i64) -> AmusingResult<usize> {
        if index < 0 || index as u64 >= self.frame_count as u64 {
            return Err(AmusingError::FrameIndex {
                index,
                frame_count: self.frame_count,
            });
        }
        Ok(index as usize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrequencyAxis {
    Linear { max_hz: f32 },
    Logarithmic { min_hz: f32, max_hz: f32 },
}

/// Normalized magnitudes in `[0, 1]`, bin-major (`values[bin * columns + column]`).
/// Bin 0 is the lowest frequency, column `columns - 1` is the current frame time.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumGrid {
    pub bins: usize,
    pub columns: usize,
    pub values: Vec<f32>,
    pub axis: FrequencyAxis,
}

impl SpectrumGrid {
    pub fn get(&self, bin: usize, column: usize) -> f32 {
        self.values[bin * self.columns + column]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeMode {
    /// `(time offset, amplitude)`
    Waveform,
    /// `(left, right)`
    Lissajous,
}

/// Points in `[-1, 1]^2`, in plotting order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopePoints {
    pub mode: ScopeMode,
    pub points: Vec<[f32; 2]>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameData {
    Spectrum(SpectrumGrid),
    Scope(ScopePoints),
}

/// Per-frame analysis of a decoded buffer. Implementations are pure:
/// the same index always yields the same data, in any order, on any thread.
pub trait Transform: Send + Sync {
    fn spec(&self) -> &FrameSpec;

    fn compute_frame(&self, index: i64) -> AmusingResult<FrameData>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Stft,
    Morlet,
    Scope,
}

#[derive(Clone, Debug)]
pub struct TransformParams {
    pub fft_size: usize,
    pub bins: usize,
    pub columns: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    pub span_secs: f32,
    pub floor_db: f32,
    pub cycles: f32,
    pub max_support_secs: f32,
    pub scope_window_secs: f32,
    pub scope_points: usize,
    pub lissajous: bool,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            bins: 128,
            columns: 256,
            min_hz: 40.0,
            max_hz: 16000.0,
            span_secs: 4.0,
            floor_db: -90.0,
            cycles: 7.0,
            max_support_secs: 0.25,
            scope_window_secs: 0.05,
            scope_points: 1024,
            lissajous: false,
        }
    }
}

impl TransformParams {
    fn validate_grid(&self) -> AmusingResult<()> {
        if self.columns == 0 {
            return Err(AmusingError::transform("column count must be positive"));
        }
        if !(self.span_secs > 0.0) {
            return Err(AmusingError::transform("span must be positive"));
        }
        if !(self.floor_db < 0.0) {
            return Err(AmusingError::transform("floor_db must be negative"));
        }
        if !(self.max_hz > 0.0) {
            return Err(AmusingError::transform("max frequency must be positive"));
        }
        Ok(())
    }
}

pub fn build(
    kind: TransformKind,
    audio: Arc<AudioBuffer>,
    spec: FrameSpec,
    params: &TransformParams,
) -> AmusingResult<Box<dyn Transform>> {
    log::info!(
        "Transform: {:?}, {} frames @ {}fps",
        kind,
        spec.frame_count,
        spec.fps
    );
    Ok(match kind {
        TransformKind::Stft => Box::new(stft::Stft::new(audio, spec, params)?),
        TransformKind::Morlet => Box::new(morlet::Morlet::new(audio, spec, params)?),
        TransformKind::Scope => Box::new(scope::Scope::new(audio, spec, params)?),
    })
}

/// Sample at a signed position, zero outside the buffer.
#[inline]
pub(crate) fn sample_at(samples: &[f32], pos: i64) -> f32 {
    if pos < 0 {
        return 0.0;
    }
    samples.get(pos as usize).copied().unwrap_or(0.0)
}

/// `len` samples starting `len / 2` before `center`, zero-padded past either end.
pub(crate) fn centered_window(samples: &[f32], center: i64, len: usize) -> Vec<f32> {
    let start = center - (len / 2) as i64;
    (0..len as i64).map(|i| sample_at(samples, start + i)).collect()
}

/// Sample positions of the grid columns for one frame: `columns` evenly spaced
/// centers over `span_secs` of history, the last one at the frame time.
pub(crate) fn column_centers(
    spec: &FrameSpec,
    index: usize,
    sample_rate: u32,
    columns: usize,
    span_secs: f32,
) -> Vec<i64> {
    let t = spec.frame_time(index);
    let step = span_secs as f64 / columns as f64;
    (0..columns)
        .map(|j| {
            let time = t - step * (columns - 1 - j) as f64;
            (time * sample_rate as f64).round() as i64
        })
        .collect()
}

/// Amplitude compression: dB scale mapped linearly from `[floor_db, 0]` to `[0, 1]`.
#[inline]
pub(crate) fn to_unit_db(magnitude: f32, floor_db: f32) -> f32 {
    let db = 20.0 * magnitude.max(1e-12).log10();
    ((db - floor_db) / -floor_db).clamp(0.0, 1.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sine(freq: f32, sample_rate: u32, secs: f32, amp: f32) -> AudioBuffer {
        let n = (sample_rate as f32 * secs) as usize;
        let samples = (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioBuffer::mono(samples, sample_rate)
    }

    pub(crate) fn silence(sample_rate: u32, secs: f32) -> AudioBuffer {
        AudioBuffer::mono(vec![0.0; (sample_rate as f32 * secs) as usize], sample_rate)
    }

    #[test]
    fn frame_count_is_rounded_duration() {
        for fps in [1, 24, 25, 30, 60] {
            for secs in [0.5f32, 1.0, 1.37, 2.0] {
                let audio = silence(8000, secs);
                let spec = FrameSpec::for_audio(&audio, fps, 64, 32).unwrap();
                assert_eq!(spec.frame_count, (audio.duration() * fps as f64).round() as usize);
            }
        }
    }

    #[test]
    fn rejects_degenerate_specs() {
        assert!(matches!(
            FrameSpec::new(0, 10, 10, 1),
            Err(AmusingError::Transform(_))
        ));
        assert!(FrameSpec::new(30, 0, 10, 1).is_err());
        assert!(FrameSpec::new(30, 10, 0, 1).is_err());
        assert!(FrameSpec::new(30, 10, 10, 0).is_err());
        let tiny = AudioBuffer::mono(vec![0.0; 10], 48000);
        assert!(FrameSpec::for_audio(&tiny, 30, 10, 10).is_err());
    }

    #[test]
    fn check_index_bounds() {
        let spec = FrameSpec::new(30, 10, 10, 5).unwrap();
        assert_eq!(spec.check_index(0).unwrap(), 0);
        assert_eq!(spec.check_index(4).unwrap(), 4);
        assert!(matches!(
            spec.check_index(-1),
            Err(AmusingError::FrameIndex { index: -1, frame_count: 5 })
        ));
        assert!(matches!(
            spec.check_index(5),
            Err(AmusingError::FrameIndex { index: 5, .. })
        ));
    }

    #[test]
    fn centered_window_zero_pads() {
        let samples = [1.0, 2.0, 3.0];
        assert_eq!(centered_window(&samples, 0, 4), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(centered_window(&samples, 2, 4), vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn last_column_sits_on_frame_time() {
        let spec = FrameSpec::new(10, 10, 10, 20).unwrap();
        let centers = column_centers(&spec, 5, 1000, 4, 2.0);
        assert_eq!(centers, vec![-1000, -500, 0, 500]);
    }

    #[test]
    fn unit_db_maps_range() {
        assert_eq!(to_unit_db(0.0, -90.0), 0.0);
        assert_eq!(to_unit_db(1.0, -90.0), 1.0);
        assert!((to_unit_db(10f32.powf(-45.0 / 20.0), -90.0) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn every_transform_rejects_out_of_range() {
        let audio = Arc::new(sine(440.0, 8000, 1.0, 0.5));
        let spec = FrameSpec::for_audio(&audio, 10, 32, 32).unwrap();
        let params = TransformParams {
            fft_size: 256,
            bins: 16,
            columns: 8,
            min_hz: 50.0,
            max_hz: 4000.0,
            span_secs: 0.5,
            ..TransformParams::default()
        };
        for kind in [TransformKind::Stft, TransformKind::Morlet, TransformKind::Scope] {
            let t = build(kind, audio.clone(), spec, &params).unwrap();
            assert!(matches!(
                t.compute_frame(-1),
                Err(AmusingError::FrameIndex { .. })
            ));
            assert!(matches!(
                t.compute_frame(spec.frame_count as i64),
                Err(AmusingError::FrameIndex { .. })
            ));
            assert!(t.compute_frame(0).is_ok());
            assert!(t.compute_frame(spec.frame_count as i64 - 1).is_ok());
        }
    }
}
