use std::sync::Arc;

use super::{sample_at, FrameData, FrameSpec, ScopeMode, ScopePoints, Transform, TransformParams};
use crate::audio::AudioBuffer;
use crate::error::{AmusingError, AmusingResult};

/// Raw waveform window around each frame time, decimated for line plotting.
pub struct Scope {
    audio: Arc<AudioBuffer>,
    spec: FrameSpec,
    window: usize,
    points: usize,
    mode: ScopeMode,
}

impl Scope {
    pub fn new(audio: Arc<AudioBuffer>, spec: FrameSpec, params: &TransformParams) -> AmusingResult<Self> {
        if !(params.scope_window_secs > 0.0) {
            return Err(AmusingError::transform("scope window must be positive"));
        }
        let window = ((params.scope_window_secs * audio.sample_rate as f32).round() as usize).max(2);
        let points = params.scope_points.min(window);
        if points < 2 {
            return Err(AmusingError::transform("scope needs at least 2 points"));
        }

        let mode = if params.lissajous {
            if audio.stereo.is_none() {
                log::warn!("Lissajous scope on mono audio: plotting left = right");
            }
            ScopeMode::Lissajous
        } else {
            ScopeMode::Waveform
        };

        Ok(Self {
            audio,
            spec,
            window,
            points,
            mode,
        })
    }
}

impl Transform for Scope {
    fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    fn compute_frame(&self, index: i64) -> AmusingResult<FrameData> {
        let index = self.spec.check_index(index)?;
        let center = (self.spec.frame_time(index) * self.audio.sample_rate as f64).round() as i64;
        let start = center - (self.window / 2) as i64;

        let positions =
            (0..self.points).map(|p| start + (p * self.window / self.points) as i64);

        let points = match (self.mode, &self.audio.stereo) {
            (ScopeMode::Waveform, _) => positions
                .enumerate()
                .map(|(p, pos)| {
                    let x = -1.0 + 2.0 * p as f32 / (self.points - 1) as f32;
                    [x, sample_at(&self.audio.samples, pos).clamp(-1.0, 1.0)]
                })
                .collect(),
            (ScopeMode::Lissajous, Some(stereo)) => positions
                .map(|pos| {
                    [
                        sample_at(&stereo.left, pos).clamp(-1.0, 1.0),
                        sample_at(&stereo.right, pos).clamp(-1.0, 1.0),
                    ]
                })
                .collect(),
            (ScopeMode::Lissajous, None) => positions
                .map(|pos| {
                    let s = sample_at(&self.audio.samples, pos).clamp(-1.0, 1.0);
                    [s, s]
                })
                .collect(),
        };

        Ok(FrameData::Scope(ScopePoints {
            mode: self.mode,
            points,
        }))
    }
}
