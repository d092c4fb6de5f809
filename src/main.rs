mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod pipeline;
mod render;
mod score;
mod transform;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use cli::{AudioArgs, Cli, Command, ScoreArgs};
use encode::ffmpeg::{ensure_parent_dir, EncodeConfig, FfmpegEncoder};
use pipeline::{render_video, PipelineOptions};
use render::text::{load_font_from_url, TextOverlay};
use render::{FrameOverlay, FrameRenderer, RenderStyle};
use score::{Amusing, MuseScore, Score};
use transform::{FrameSpec, TransformKind, TransformParams};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                Some(cfg)
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                None
            }
        },
        None => None,
    };

    match &mut cli.command {
        Command::Audio(args) => {
            if let Some(cfg) = cfg {
                merge_audio_config(args, cfg);
            }
            run_audio(args)
        }
        Command::Score(args) => {
            if let Some(cfg) = cfg {
                merge_score_config(args, cfg);
            }
            run_score(args)
        }
    }
}

// Config values apply only when the CLI is at its default.
fn merge_audio_config(cli: &mut AudioArgs, cfg: config::Config) {
    if cli.width == config::default_width() { cli.width = cfg.output.width; }
    if cli.height == config::default_height() { cli.height = cfg.output.height; }
    if cli.fps == config::default_fps() { cli.fps = cfg.output.fps; }
    if cli.crf == config::default_crf() { cli.crf = cfg.output.crf; }
    if cli.codec == config::default_codec() { cli.codec = cfg.output.codec; }
    if cli.font.is_none() { cli.font = cfg.output.font; }
    if cli.font_url.is_none() { cli.font_url = cfg.output.font_url; }
    if cli.transform == config::default_transform() { cli.transform = cfg.audio.transform; }
    if cli.fft_size == config::default_fft_size() { cli.fft_size = cfg.audio.fft_size; }
    if cli.bins == config::default_bins() { cli.bins = cfg.audio.bins; }
    if cli.min_freq == config::default_min_freq() { cli.min_freq = cfg.audio.min_freq; }
    if cli.max_freq == config::default_max_freq() { cli.max_freq = cfg.audio.max_freq; }
    if cli.span == config::default_span() { cli.span = cfg.audio.span; }
    if cli.floor_db == config::default_floor_db() { cli.floor_db = cfg.audio.floor_db; }
    if cli.colormap == config::default_colormap() { cli.colormap = cfg.audio.colormap; }
}

fn merge_score_config(cli: &mut ScoreArgs, cfg: config::Config) {
    if cli.musescore == config::default_musescore() { cli.musescore = cfg.score.musescore; }
    if cli.workers == config::default_workers() { cli.workers = cfg.score.workers; }
}

fn progress_bar(len: u64, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {} ({{eta}} remaining)",
                unit
            ))
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

fn run_audio(cli: &AudioArgs) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("amusing - audio visualizer");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    // 1. Decode audio
    log::info!("Decoding audio...");
    let keep_stereo = cli.transform == TransformKind::Scope && cli.lissajous;
    let audio = Arc::new(
        audio::read_audio(&cli.input, keep_stereo)
            .with_context(|| format!("Failed to decode {}", cli.input.display()))?,
    );

    // 2. Frame geometry and transform
    let spec = FrameSpec::for_audio(&audio, cli.fps, cli.width, cli.height)?;
    log::info!(
        "Total frames: {}, Duration: {:.1}s",
        spec.frame_count,
        audio.duration()
    );
    let params = TransformParams {
        fft_size: cli.fft_size,
        bins: cli.bins,
        columns: cli.columns,
        min_hz: cli.min_freq,
        max_hz: cli.max_freq,
        span_secs: cli.span,
        floor_db: cli.floor_db,
        cycles: cli.cycles,
        scope_window_secs: cli.scope_window,
        lissajous: cli.lissajous,
        ..TransformParams::default()
    };
    let transform = transform::build(cli.transform, audio.clone(), spec, &params)
        .context("Invalid transform configuration")?;

    let renderer = FrameRenderer::new(
        &spec,
        RenderStyle {
            colormap: cli.colormap,
            ..RenderStyle::default()
        },
    );

    // 3. Text overlay
    let overlay = if cli.title.is_some() || cli.show_time {
        let shorter = cli.width.min(cli.height) as f32;
        let font_size = (shorter * 0.046).max(24.0);
        let text = if let Some(ref url) = cli.font_url {
            let bytes = load_font_from_url(url)?;
            TextOverlay::from_bytes(&bytes, font_size)?
        } else if let Some(ref path) = cli.font {
            TextOverlay::from_file(path, font_size)?
        } else {
            anyhow::bail!("--title and --show-time need a font (--font or --font-url)");
        };
        Some(FrameOverlay::new(text, cli.title.clone(), cli.show_time, cli.fps))
    } else {
        None
    };

    // 4. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    ensure_parent_dir(&cli.output)?;
    let encoder = FfmpegEncoder::new(&EncodeConfig {
        output: cli.output.clone(),
        audio: Some(cli.input.clone()),
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        codec: cli.codec.clone(),
        pix_fmt: cli.pix_fmt.clone(),
        crf: cli.crf,
        bitrate: cli.bitrate.clone(),
    })?;

    // 5. Render loop
    let pb = progress_bar(spec.frame_count as u64, "frames")?;
    let options = PipelineOptions {
        workers: cli.workers,
        overlay: overlay.as_ref(),
        frames_dir: cli.frames_dir.as_deref(),
    };
    let written = render_video(transform.as_ref(), &renderer, Box::new(encoder), &options, &pb)?;
    pb.finish_with_message("Rendering complete");

    log::info!("Done! {} frames, output: {}", written, cli.output.display());
    Ok(())
}

fn run_score(cli: &ScoreArgs) -> Result<()> {
    log::info!("amusing - score animator");
    let score = Score::open(&cli.score)?;

    let amusing = cli.jobs.iter().cloned().fold(
        Amusing::new(cli.width, &cli.output)
            .with_workers(cli.workers)
            .with_frame0(cli.frame0)
            .with_first_empty_frame(!cli.no_empty_frame)
            .with_alpha_only(!cli.no_alpha),
        |amusing, job| amusing.add_job(job.measures, job.subdivision),
    );

    if let Some(ref path) = cli.dump_plan {
        let plan = amusing.plan(&score)?;
        let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        log::info!("Wrote export plan ({} steps) to {}", plan.len(), path.display());
    }
    if amusing.jobs().is_empty() {
        log::warn!("No --job given, nothing to export");
        return Ok(());
    }
    log::info!("{} job(s)", amusing.jobs().len());

    let musescore = MuseScore::new(
        &cli.musescore,
        cli.width,
        &score,
        cli.output.join("__temp__"),
    )
    .keep_temp(cli.keep_temp)
    .serial(cli.serial)
    .max_tremolo(cli.max_tremolo);
    log::info!(
        "MuseScore: {} at {:.1} dpi",
        cli.musescore.display(),
        musescore.dpi()
    );

    let pb = progress_bar(0, "images")?;
    let written = amusing.generate_frames(&score, &musescore, &pb);
    musescore.cleanup();
    let written = written?;
    pb.finish_with_message("Export complete");

    log::info!("Done! {} images in {}", written, cli.output.display());
    Ok(())
}
