mod animation;
mod audio;
mod cli;
mod config;
mod encode;
mod render;
mod scene;
mod visualizer;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use animation::{AnimationLoop, FrameDriver, OfflineDriver, RealtimeDriver, RunStats, SwitchEvent, SwitchSchedule};
use audio::{AnalyserSource, AudioFrameSource, SilentSource};
use cli::Cli;
use config::Config;
use encode::ffmpeg::EncoderSettings;
use render::text::TextOverlay;
use render::{FrameSink, NullSink, OverlayOptions, VideoSink};
use scene::Camera;
use visualizer::{Switcher, VisualizerKind};

const ROTATE_ALL: &str = "all";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if cli.list_visualizers {
        println!("Available visualizers:");
        for kind in VisualizerKind::ALL {
            println!("  {}", kind.label());
        }
        println!("  {:<20} rotate through every visualizer", ROTATE_ALL);
        return Ok(());
    }

    // Explicit --config must load; a discovered one only warns.
    let config = match cli.config.clone() {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => match config::discover_config() {
            Some(path) => match config::load_config(&path) {
                Ok(cfg) => {
                    log::info!("Loaded config from {}", path.display());
                    cfg
                }
                Err(err) => {
                    log::warn!("Ignoring config: {}", err);
                    Config::default()
                }
            },
            None => Config::default(),
        },
    };

    // Config values apply only when the CLI is at its default.
    if cli.width == 1920 { cli.width = config.output.width; }
    if cli.height == 1080 { cli.height = config.output.height; }
    if cli.fps == 60 { cli.fps = config.output.fps; }
    if cli.crf == 18 { cli.crf = config.output.crf; }
    if cli.codec == "libx264" { cli.codec = config.output.codec.clone(); }
    if cli.pix_fmt == "yuv420p" { cli.pix_fmt = config.output.pix_fmt.clone(); }
    if cli.font.is_none() { cli.font = config.output.font.clone(); }
    if cli.seed.is_none() { cli.seed = config.visualizer.seed; }

    cli.check()?;

    // 1. Audio
    let (audio, duration): (Box<dyn AudioFrameSource>, f32) = match &cli.input {
        Some(input) => {
            if !input.exists() {
                anyhow::bail!("Input file not found: {}", input.display());
            }
            log::info!("Decoding audio from {}...", input.display());
            let data = audio::decode_audio(input)?;
            let source = AnalyserSource::new(data, config.audio.analyser_settings())
                .context("Invalid analyser settings")?;
            let duration = cli.duration.unwrap_or(source.duration()).min(source.duration());
            (Box::new(source), duration)
        }
        None => {
            let duration = cli
                .duration
                .context("An input audio file or --duration is required")?;
            log::warn!("No input audio; visualizers will run on silence");
            (Box::new(SilentSource::new(config.audio.fft_size / 2)), duration)
        }
    };

    // 2. Switch schedule
    let initial = cli
        .visualizer
        .clone()
        .unwrap_or_else(|| config.visualizer.default.clone());
    let mut events = if initial == ROTATE_ALL {
        SwitchEvent::rotation(duration)
    } else {
        vec![SwitchEvent { at: 0.0, label: initial }]
    };
    events.extend(config.visualizer.switch.iter().map(|entry| SwitchEvent {
        at: entry.at,
        label: entry.visualizer.clone(),
    }));
    for raw in &cli.switches {
        events.push(raw.parse().with_context(|| format!("Invalid --switch '{}'", raw))?);
    }
    let schedule = SwitchSchedule::new(events);

    log::info!("pulseviz - audio-reactive visualizer");
    log::info!("Duration: {:.1}s, {} scheduled switch(es)", duration, schedule.len());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    let mut animation = AnimationLoop::new(audio, Switcher::new(cli.seed), schedule);

    // 3. Frame driver
    let offline = OfflineDriver::new(cli.fps, duration);
    let total_frames = offline.total_frames() as u64;
    let mut driver: Box<dyn FrameDriver> = if cli.realtime {
        Box::new(RealtimeDriver::new(cli.fps, Some(duration)))
    } else {
        Box::new(offline)
    };

    // 4. Render
    let stats = if cli.dry_run {
        let mut sink = NullSink::default();
        let stats = run_with_progress(&mut animation, driver.as_mut(), &mut sink, total_frames)?;
        log::info!("Dry run: {} frames discarded", sink.frames());
        stats
    } else {
        let overlay = if cli.show_label || cli.show_time {
            let font = cli
                .font
                .as_deref()
                .context("--show-label/--show-time need a font (--font or [output] font)")?;
            let font_size = (cli.width.min(cli.height) as f32 * 0.046).max(24.0);
            Some(OverlayOptions {
                overlay: TextOverlay::from_file(font, font_size)?,
                show_label: cli.show_label,
                show_time: cli.show_time,
            })
        } else {
            None
        };

        let camera = Camera::new(config.camera.fov, config.camera.distance, cli.width, cli.height);
        let encoder = EncoderSettings {
            output: cli.output.clone(),
            audio: cli.input.clone(),
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
            codec: cli.codec.clone(),
            pix_fmt: cli.pix_fmt.clone(),
            crf: cli.crf,
        };
        let mut sink = Box::new(VideoSink::new(camera, &encoder, overlay)?);
        let stats = run_with_progress(&mut animation, driver.as_mut(), sink.as_mut(), total_frames)?;
        sink.finish()?;
        log::info!("Done! Output: {}", cli.output.display());
        stats
    };

    log::info!(
        "Last selection: {}",
        animation.switcher().settings().visualizer_style
    );
    animation.shutdown();
    log::info!(
        "{} frames, {} switches, peak {} primitives",
        stats.frames,
        stats.switches,
        stats.peak_primitives
    );
    Ok(())
}

fn run_with_progress(
    animation: &mut AnimationLoop,
    driver: &mut dyn FrameDriver,
    sink: &mut dyn FrameSink,
    total_frames: u64,
) -> Result<RunStats> {
    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let stats = animation.run(driver, sink, |info| pb.set_position(info.index + 1))?;
    pb.finish_with_message("Rendering complete");
    Ok(stats)
}
