mod cli;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use cli::Cli;
use cosmoscope::audio::decode::decode_audio;
use cosmoscope::audio::{AudioContext, AudioData, AutoplayPolicy};
use cosmoscope::config::{self, Config};
use cosmoscope::render::postprocess::GpuBloom;
use cosmoscope::render::raster::MAX_SIDE;
use cosmoscope::render::{Mode, Raster};
use cosmoscope::visualizer::FftSizes;
use cosmoscope::{FrameOutcome, Visualizer};
use encode::ffmpeg::{EncoderSettings, FfmpegEncoder};

/// Fixed mode, or rotate through all of them every `cycle_secs`.
#[derive(Debug, Clone, Copy)]
enum ModePlan {
    Fixed(Mode),
    Cycle { cycle_secs: f32 },
}

impl ModePlan {
    fn initial(&self) -> Mode {
        match self {
            ModePlan::Fixed(mode) => *mode,
            ModePlan::Cycle { .. } => Mode::ALL[0],
        }
    }

    fn at(&self, clock: f64) -> Mode {
        match self {
            ModePlan::Fixed(mode) => *mode,
            ModePlan::Cycle { cycle_secs } => {
                let idx = (clock / *cycle_secs as f64) as usize % Mode::ALL.len();
                Mode::ALL[idx]
            }
        }
    }
}

/// Flags given on the command line win over the config file.
fn apply_cli_overrides(cli: &Cli, cfg: &mut Config) {
    let out = &mut cfg.output;
    out.width = cli.width.unwrap_or(out.width);
    out.height = cli.height.unwrap_or(out.height);
    out.fps = cli.fps.unwrap_or(out.fps);
    out.crf = cli.crf.unwrap_or(out.crf);
    if let Some(codec) = &cli.codec {
        out.codec = codec.clone();
    }
    if let Some(pix_fmt) = &cli.pix_fmt {
        out.pix_fmt = pix_fmt.clone();
    }
    if cli.bitrate.is_some() {
        out.bitrate = cli.bitrate.clone();
    }
    if cli.mode.is_some() {
        out.mode = cli.mode.clone();
    }
    out.cycle_secs = cli.cycle_secs.unwrap_or(out.cycle_secs);

    if let Some(size) = cli.fft_size {
        cfg.analyzer.fft_size = FftSizes::uniform(size);
    }
    if let Some(amplification) = cli.amplification {
        cfg.mapper.amplification = amplification;
    }
    if let Some(smoothing) = cli.smoothing {
        cfg.analyzer.smoothing_time_constant = smoothing;
    }
}

struct Track {
    path: PathBuf,
    audio: AudioData,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_modes {
        println!("Available modes:");
        for mode in Mode::ALL {
            println!("  {}", mode);
        }
        println!("  all (cycles through every mode)");
        return Ok(());
    }

    let mut cfg = match config::discover_config_path(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    apply_cli_overrides(&cli, &mut cfg);
    let out = &cfg.output;

    if out.width == 0 || out.height == 0 || out.fps == 0 {
        anyhow::bail!("Width, height and fps must be positive");
    }
    if out.width > MAX_SIDE || out.height > MAX_SIDE {
        anyhow::bail!("Width and height are limited to {}px", MAX_SIDE);
    }
    let cycle_secs = out.cycle_secs;

    let plan = match out.mode.as_deref().unwrap_or("waveform") {
        "all" => {
            if !(cycle_secs > 0.0) {
                anyhow::bail!("--cycle-secs must be positive, got {}", cycle_secs);
            }
            ModePlan::Cycle { cycle_secs }
        }
        name => ModePlan::Fixed(name.parse::<Mode>().map_err(anyhow::Error::msg)?),
    };

    if cli.inputs.is_empty() {
        anyhow::bail!("At least one input audio file is required");
    }

    log::info!("cosmoscope - audio-reactive visualizer");
    log::info!("Output: {}", cli.output.display());
    log::info!("Mode: {:?}", plan);
    log::info!("Resolution: {}x{} @ {}fps", out.width, out.height, out.fps);

    // 1. Decode the playlist, skipping what symphonia can't read
    log::info!("Decoding {} input(s)...", cli.inputs.len());
    let mut tracks = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        match decode_audio(path) {
            Ok(audio) => tracks.push(Track { path: path.clone(), audio }),
            Err(err) => log::warn!("Skipping {}: {}", path.display(), err),
        }
    }
    if tracks.is_empty() {
        anyhow::bail!("None of the inputs could be decoded");
    }
    let total_secs: f64 = tracks.iter().map(|t| t.audio.duration()).sum();
    let total_frames = (total_secs * out.fps as f64).ceil() as u64;
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, total_secs);

    // 2. Surface, with GPU bloom when available
    let mut surface = Raster::new(out.width, out.height);
    if !cli.cpu_bloom {
        log::info!("Initializing GPU...");
        match GpuBloom::new() {
            Ok(gpu) => surface = surface.with_gpu_bloom(gpu),
            Err(err) => log::warn!("GPU unavailable, bloom runs on the CPU: {:#}", err),
        }
    }

    // 3. Visualizer
    let viz_config = cfg.visualizer_config(plan.initial())?;
    let mut viz = Visualizer::new(AudioContext::new(AutoplayPolicy::Allowed), surface, viz_config)?;
    viz.subscribe(|event| log::debug!("Playback event: {:?}", event));

    // 4. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let audio_paths: Vec<PathBuf> = tracks.iter().map(|t| t.path.clone()).collect();
    let settings = EncoderSettings {
        width: out.width,
        height: out.height,
        fps: out.fps,
        codec: out.codec.clone(),
        pix_fmt: out.pix_fmt.clone(),
        crf: out.crf,
        bitrate: out.bitrate.clone(),
    };
    let mut encoder = FfmpegEncoder::new(&cli.output, &audio_paths, &settings)?;

    // 5. Frame loop, one track at a time
    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let dt = 1.0 / out.fps as f64;
    for track in tracks {
        let label = track.path.display().to_string();
        viz.load_audio(track.audio, label)
            .with_context(|| format!("Failed to load {}", track.path.display()))?;
        viz.play()?;

        loop {
            let mode = plan.at(viz.clock());
            if mode != viz.mode() {
                viz.set_mode(mode)?;
            }
            match viz.tick(dt) {
                FrameOutcome::Drawn { .. } => {
                    encoder.write_frame(viz.surface().pixels())?;
                    pb.inc(1);
                }
                FrameOutcome::Skipped => break,
            }
        }
    }

    pb.finish_with_message("Rendering complete");
    viz.teardown();

    // 6. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_plan_rotates_modes() {
        let plan = ModePlan::Cycle { cycle_secs: 2.0 };
        assert_eq!(plan.initial(), Mode::Waveform);
        assert_eq!(plan.at(1.9), Mode::Waveform);
        assert_eq!(plan.at(2.0), Mode::Bars);
        assert_eq!(plan.at(6.5), Mode::Procedural3d);
        assert_eq!(plan.at(8.0), Mode::Waveform);
        assert_eq!(ModePlan::Fixed(Mode::Circular).at(100.0), Mode::Circular);
    }

    fn file_config() -> Config {
        config::parse_config(
            r#"
            [output]
            width = 1920
            height = 1080
            codec = "libx265"
            mode = "bars"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_explicit_flags_beat_the_config_file() {
        let cli = Cli::parse_from(["cosmoscope", "a.wav", "--width", "1280", "--codec", "libx264", "-m", "circular"]);
        let mut cfg = file_config();
        apply_cli_overrides(&cli, &mut cfg);
        assert_eq!(cfg.output.width, 1280);
        assert_eq!(cfg.output.codec, "libx264");
        assert_eq!(cfg.output.mode.as_deref(), Some("circular"));
        assert_eq!(cfg.output.height, 1080);
    }

    #[test]
    fn test_config_file_fills_unset_flags() {
        let cli = Cli::parse_from(["cosmoscope", "a.wav", "--fft-size", "512"]);
        let mut cfg = file_config();
        apply_cli_overrides(&cli, &mut cfg);
        assert_eq!((cfg.output.width, cfg.output.height), (1920, 1080));
        assert_eq!(cfg.output.fps, 60);
        assert_eq!(cfg.output.pix_fmt, "yuv420p");
        assert_eq!(cfg.output.mode.as_deref(), Some("bars"));
        assert_eq!(cfg.analyzer.fft_size, FftSizes::uniform(512));
    }
}
