use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AmusingError, AmusingResult};

/// Left/right channels kept alongside the mono mix for Lissajous scopes.
#[derive(Clone, Debug)]
pub struct StereoPair {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

/// Decoded audio. Immutable once built; shared read-only with transforms.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub stereo: Option<StereoPair>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    #[cfg(test)]
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            stereo: None,
            sample_rate,
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

pub fn read_audio(path: &Path, keep_stereo: bool) -> AmusingResult<AudioBuffer> {
    let file = std::fs::File::open(path).map_err(|e| AmusingError::decode(path, e))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AmusingError::decode(path, format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AmusingError::decode(path, "no audio tracks found"))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AmusingError::decode(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AmusingError::decode(path, format!("failed to create decoder: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AmusingError::decode(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(AmusingError::decode(path, e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        for frame_samples in sample_buf.samples().chunks(channels) {
            let mix: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
            mono.push(mix);
            if keep_stereo {
                let l = frame_samples[0];
                let r = frame_samples.get(1).copied().unwrap_or(l);
                left.push(l);
                right.push(r);
            }
        }
    }

    if mono.is_empty() {
        return Err(AmusingError::decode(path, "stream contains no samples"));
    }

    log::info!(
        "Decoded audio: {} samples, {} channel(s), {}Hz, {:.1}s",
        mono.len(),
        channels,
        sample_rate,
        mono.len() as f32 / sample_rate as f32
    );

    Ok(AudioBuffer {
        samples: mono,
        stereo: keep_stereo.then_some(StereoPair { left, right }),
        sample_rate,
    })
}
