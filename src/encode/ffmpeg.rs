use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::VideoSink;
use crate::error::{AmusingError, AmusingResult};
use crate::render::Frame;

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub output: PathBuf,
    /// Muxed in as the soundtrack when set.
    pub audio: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

impl EncodeConfig {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".into(), "error".into(),
            "-f".into(), "rawvideo".into(),
            "-pixel_format".into(), "rgba".into(),
            "-video_size".into(), format!("{}x{}", self.width, self.height),
            "-framerate".into(), self.fps.to_string(),
            "-i".into(), "pipe:0".into(),
        ];

        if let Some(ref audio) = self.audio {
            args.extend(["-i".to_string(), audio.to_string_lossy().into_owned()]);
        }

        args.extend([
            "-c:v".to_string(), self.codec.clone(),
            "-pix_fmt".into(), self.pix_fmt.clone(),
        ]);

        if let Some(ref br) = self.bitrate {
            args.extend(["-b:v".to_string(), br.clone()]);
        } else {
            args.extend(["-crf".to_string(), self.crf.to_string()]);
            args.extend(["-preset".to_string(), "medium".to_string()]);
        }

        if self.audio.is_some() {
            args.extend([
                "-c:a".to_string(), "aac".into(),
                "-b:a".into(), "192k".into(),
                "-shortest".into(),
            ]);
        } else {
            args.push("-an".into());
        }

        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Streams raw RGBA frames into an `ffmpeg` child process.
pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
    next_index: usize,
}

impl FfmpegEncoder {
    pub fn new(config: &EncodeConfig) -> AmusingResult<Self> {
        Self::with_program("ffmpeg", config)
    }

    pub fn with_program(program: &str, config: &EncodeConfig) -> AmusingResult<Self> {
        ensure_parent_dir(&config.output)?;

        let child = Command::new(program)
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AmusingError::encode(format!("failed to spawn {}: {}. Is ffmpeg installed?", program, e))
            })?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            config.width,
            config.height,
            config.fps,
            config.codec
        );

        Ok(Self {
            child,
            frame_bytes: (config.width * config.height * 4) as usize,
            next_index: 0,
        })
    }
}

impl VideoSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> AmusingResult<()> {
        if frame.index != self.next_index {
            return Err(AmusingError::encode(format!(
                "frame {} delivered out of order, expected {}",
                frame.index, self.next_index
            )));
        }
        if frame.pixels.len() != self.frame_bytes {
            return Err(AmusingError::encode(format!(
                "frame {} has {} bytes, expected {}",
                frame.index,
                frame.pixels.len(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| AmusingError::encode("ffmpeg stdin not available"))?;
        stdin.write_all(&frame.pixels).map_err(|e| {
            AmusingError::encode(format!("failed to write frame {} to ffmpeg: {}", frame.index, e))
        })?;
        self.next_index += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> AmusingResult<()> {
        let Self {
            mut child,
            next_index,
            ..
        } = *self;
        // Close stdin to signal EOF
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .map_err(|e| AmusingError::encode(format!("failed to wait for ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AmusingError::encode(format!(
                "ffmpeg exited with {}:\n{}",
                output.status, stderr
            )));
        }

        log::info!("FFmpeg encoding complete ({} frames)", next_index);
        Ok(())
    }
}

pub fn ensure_parent_dir(path: &Path) -> AmusingResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AmusingError::io(format!("failed to create directory '{}'", parent.display()), e)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EncodeConfig {
        EncodeConfig {
            output: PathBuf::from("out/video.mp4"),
            audio: Some(PathBuf::from("song.flac")),
            width: 640,
            height: 360,
            fps: 25,
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 20,
            bitrate: None,
        }
    }

    #[test]
    fn args_describe_raw_input_and_audio_mux() {
        let args = config().args();
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pixel_format rgba -video_size 640x360 -framerate 25 -i pipe:0"));
        assert!(joined.contains("-i song.flac"));
        assert!(joined.contains("-crf 20"));
        assert!(joined.contains("-shortest"));
        assert_eq!(args.last().unwrap(), "out/video.mp4");
    }

    #[test]
    fn bitrate_replaces_crf_and_no_audio_disables_track() {
        let mut cfg = config();
        cfg.bitrate = Some("5M".into());
        cfg.audio = None;
        let args = cfg.args();
        assert!(args.windows(2).any(|w| w == ["-b:v", "5M"]));
        assert!(!args.iter().any(|a| a == "-crf"));
        assert!(args.iter().any(|a| a == "-an"));
    }

    #[test]
    fn missing_encoder_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.output = dir.path().join("video.mp4");
        let err = FfmpegEncoder::with_program("amusing-no-such-encoder", &cfg)
            .err()
            .unwrap();
        assert!(matches!(err, AmusingError::Encode(_)));
    }
}
