use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::render::Colormap;
use crate::score::note::Note;
use crate::score::Job;
use crate::transform::TransformKind;

#[derive(Parser, Debug)]
#[command(name = "amusing", about = "Music visualization frames and videos")]
pub struct Cli {
    /// Config file (default: ./amusing.toml or ~/.config/amusing/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a spectrogram or oscilloscope video of an audio file
    Audio(AudioArgs),
    /// Export frames revealing a MuseScore score step by step
    Score(ScoreArgs),
}

#[derive(Args, Debug)]
pub struct AudioArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = TransformKind::Stft)]
    pub transform: TransformKind,

    /// Video width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Frame rendering threads
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// STFT window length in samples (power of two)
    #[arg(long, default_value_t = 4096)]
    pub fft_size: usize,

    /// Frequency rows of the spectrogram
    #[arg(long, default_value_t = 128)]
    pub bins: usize,

    /// Time columns of the spectrogram
    #[arg(long, default_value_t = 256)]
    pub columns: usize,

    /// Lowest Morlet frequency in Hz
    #[arg(long, default_value_t = 40.0)]
    pub min_freq: f32,

    /// Highest displayed frequency in Hz
    #[arg(long, default_value_t = 16000.0)]
    pub max_freq: f32,

    /// Seconds of history shown by the spectrogram
    #[arg(long, default_value_t = 4.0)]
    pub span: f32,

    /// Level mapped to the bottom of the colormap, in dB
    #[arg(long, default_value_t = -90.0, allow_hyphen_values = true)]
    pub floor_db: f32,

    /// Morlet wavelet cycles
    #[arg(long, default_value_t = 7.0)]
    pub cycles: f32,

    /// Oscilloscope window in seconds
    #[arg(long, default_value_t = 0.05)]
    pub scope_window: f32,

    /// Plot left against right channel instead of the waveform
    #[arg(long)]
    pub lissajous: bool,

    #[arg(long, value_enum, default_value_t = Colormap::Magma)]
    pub colormap: Colormap,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Title text overlay
    #[arg(long)]
    pub title: Option<String>,

    /// Show elapsed time overlay
    #[arg(long)]
    pub show_time: bool,

    /// TrueType/OpenType font for overlays
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Download the overlay font from this URL
    #[arg(long)]
    pub font_url: Option<String>,

    /// Also write every frame as frame_NNNNNN.png into this directory
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// MuseScore file (.mscx or .mscz)
    pub score: PathBuf,

    /// Image width in pixels
    #[arg(long)]
    pub width: u32,

    /// Output directory for frmNNNN.png files
    #[arg(short, long, default_value = "frames")]
    pub output: PathBuf,

    /// Parallel MuseScore exports
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Reveal job "<measures>=<note>", e.g. "2-4=8" or "all=4t". Repeatable.
    #[arg(short, long = "job")]
    pub jobs: Vec<Job>,

    /// MuseScore executable
    #[arg(long, default_value = "mscore")]
    pub musescore: PathBuf,

    /// Shortest two-chord tremolo interval drawn alternating, e.g. "32"
    #[arg(long, default_value = "32")]
    pub max_tremolo: Note,

    /// Number of the first exported frame
    #[arg(long, default_value_t = 0)]
    pub frame0: u32,

    /// Skip the leading frame with nothing revealed
    #[arg(long)]
    pub no_empty_frame: bool,

    /// Keep color images instead of reducing them to their alpha channel
    #[arg(long)]
    pub no_alpha: bool,

    /// Keep the rewritten temporary scores
    #[arg(long)]
    pub keep_temp: bool,

    /// Run one MuseScore process at a time
    #[arg(long)]
    pub serial: bool,

    /// Write the export plan as JSON to this file
    #[arg(long)]
    pub dump_plan: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::jobs::MeasureSelector;

    #[test]
    fn parses_audio_command() {
        let cli = Cli::try_parse_from([
            "amusing", "audio", "song.flac", "-t", "morlet", "--floor-db", "-70", "--colormap",
            "grayscale",
        ])
        .unwrap();
        let Command::Audio(args) = cli.command else {
            panic!("expected audio command");
        };
        assert_eq!(args.transform, TransformKind::Morlet);
        assert_eq!(args.floor_db, -70.0);
        assert_eq!(args.colormap, Colormap::Grayscale);
        assert_eq!(args.width, 1920);
    }

    #[test]
    fn parses_repeated_jobs() {
        let cli = Cli::try_parse_from([
            "amusing", "score", "piece.mscz", "--width", "1600", "--job", "1-4=8", "--job",
            "5-=4t", "--config", "my.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        let Command::Score(args) = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(args.jobs.len(), 2);
        assert_eq!(args.max_tremolo, Note::new(32));
        assert_eq!(
            args.jobs[1].measures,
            MeasureSelector::Range { start: 5, end: None }
        );
    }

    #[test]
    fn rejects_bad_job() {
        let err = Cli::try_parse_from(["amusing", "score", "piece.mscx", "--width", "800", "--job", "x=4"]);
        assert!(err.is_err());
    }
}
