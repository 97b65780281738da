use std::{
    io::Write as _,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use reelcast::{
    AudioOutput, AudioPayload, BlockShaper, ContainerFormat, ExportOpts,
    FfmpegSink, FfmpegSinkOpts, HeadlessOutput, Pacing, ParleyShaper, PreviewController,
    PreviewFrame, PreviewState, Quality, ReelCompositor, ReelProject, ReelScene, TextShaper,
    WordState,
};

#[derive(Parser, Debug)]
#[command(name = "reelcast", version, about = "Compose word-timed vertical reels")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print estimated subtitle timing as JSON.
    Timing(TimingArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Export the reel to MP4 or WebM (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Play a terminal karaoke preview driven by the audio clock.
    Preview(PreviewArgs),
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Input reel project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Override the words-per-chunk cap.
    #[arg(long)]
    words: Option<usize>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Override the output quality.
    #[arg(long, value_parser = parse_quality)]
    quality: Option<Quality>,

    /// Font file for subtitles (overrides the manifest).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Draw subtitles as blocks instead of shaping text (no font needed).
    #[arg(long)]
    block_text: bool,
}

#[derive(Parser, Debug)]
struct TimingArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Time offset in seconds.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Directory the video is written into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Preferred container; the other one is the fallback.
    #[arg(long, value_enum, default_value_t = FormatChoice::Mp4)]
    format: FormatChoice,

    /// Pace frames against the wall clock instead of rendering as fast as possible.
    #[arg(long)]
    realtime: bool,

    /// `ffmpeg` executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Refresh rate of the terminal display.
    #[arg(long, default_value_t = 30)]
    refresh: u32,

    /// Never open an audio device, even when built with playback support.
    #[arg(long)]
    silent: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Mp4,
    Webm,
}

fn parse_quality(s: &str) -> Result<Quality, String> {
    s.parse().map_err(|e: reelcast::ReelError| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.cmd {
        Command::Timing(args) => cmd_timing(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

fn load_project(args: &ProjectArgs) -> anyhow::Result<ReelProject> {
    let mut project = ReelProject::from_path(&args.in_path)
        .with_context(|| format!("load reel project '{}'", args.in_path.display()))?;
    if let Some(words) = args.words {
        project.words_per_chunk = words;
    }
    project.validate()?;
    Ok(project)
}

fn make_shaper(project: &ReelProject, args: &RenderArgs) -> anyhow::Result<Box<dyn TextShaper>> {
    if args.block_text {
        return Ok(Box::new(BlockShaper::new()));
    }
    let path = args
        .font
        .clone()
        .or_else(|| project.font_path())
        .context("a font file is required: pass --font, set \"font\" in the project, or use --block-text")?;
    Ok(Box::new(ParleyShaper::from_path(&path)?))
}

fn cmd_timing(args: TimingArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let narration = reelcast::decode(&project.narration_payload()?, 48_000)?;
    let chunks = reelcast::estimate(
        &project.script_lines(),
        narration.duration,
        &project.timing_opts(),
    )?;
    let out = serde_json::json!({
        "title": project.title,
        "duration": narration.duration,
        "chunks": chunks,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut project = load_project(&args.project)?;
    if let Some(q) = args.render.quality {
        project.quality = q;
    }
    let shaper = make_shaper(&project, &args.render)?;

    let narration = reelcast::decode(&project.narration_payload()?, 48_000)?;
    let chunks = reelcast::estimate(
        &project.script_lines(),
        narration.duration,
        &project.timing_opts(),
    )?;
    let images = reelcast::load_images(&project.image_sources());
    let scene = ReelScene {
        canvas: project.quality.canvas(),
        duration: narration.duration,
        chunks,
        style: project.style.clone(),
    };
    let mut compositor = ReelCompositor::new(scene, &images, shaper)?;
    let frame = compositor.draw_frame(args.at)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut project = load_project(&args.project)?;
    if let Some(q) = args.render.quality {
        project.quality = q;
    }
    let shaper = make_shaper(&project, &args.render)?;
    let req = project.to_export_request()?;

    let preferred = match args.format {
        FormatChoice::Mp4 => ContainerFormat::Mp4,
        FormatChoice::Webm => ContainerFormat::WebM,
    };
    let mut container_prefs = vec![preferred];
    container_prefs.extend(
        ContainerFormat::PREFERENCE
            .into_iter()
            .filter(|f| *f != preferred),
    );
    let opts = ExportOpts {
        fps: project.fps()?,
        pacing: if args.realtime {
            Pacing::RealTime
        } else {
            Pacing::Virtual
        },
        container_prefs,
        ..ExportOpts::default()
    };

    let mut sink = FfmpegSink::new(FfmpegSinkOpts {
        program: args.ffmpeg,
        ..FfmpegSinkOpts::default()
    });
    let started = Instant::now();
    let video = reelcast::export_reel(&req, &opts, shaper, &mut sink)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let out = args.out_dir.join(&video.file_name);
    std::fs::write(&out, &video.bytes).with_context(|| format!("write '{}'", out.display()))?;

    eprintln!(
        "wrote {} ({} frames, {:.1}s)",
        out.display(),
        video.frames,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let narration = match project.narration_payload() {
        Ok(n) => n,
        Err(e) => return report_unavailable(&project.title, &e.to_string()),
    };
    let refresh = Duration::from_secs_f64(1.0 / f64::from(args.refresh.max(1)));

    if !args.silent && preview_on_speakers(&project, &narration, refresh)? {
        return Ok(());
    }
    let output = HeadlessOutput::new(48_000)?;
    run_preview(&project, &narration, output, refresh, |out, dt| {
        out.pump(dt).map(drop)
    })
}

#[cfg(feature = "playback")]
fn preview_on_speakers(
    project: &ReelProject,
    narration: &AudioPayload,
    refresh: Duration,
) -> anyhow::Result<bool> {
    let output = match reelcast::RodioOutput::open_default() {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(error = %e, "no audio device; previewing silently");
            return Ok(false);
        }
    };
    run_preview(project, narration, output, refresh, |_, _| Ok(()))?;
    Ok(true)
}

#[cfg(not(feature = "playback"))]
fn preview_on_speakers(
    _project: &ReelProject,
    _narration: &AudioPayload,
    _refresh: Duration,
) -> anyhow::Result<bool> {
    Ok(false)
}

fn run_preview<O: AudioOutput>(
    project: &ReelProject,
    narration: &AudioPayload,
    output: O,
    refresh: Duration,
    mut advance: impl FnMut(&mut O, f64) -> reelcast::ReelResult<()>,
) -> anyhow::Result<()> {
    let mut controller = PreviewController::new(output, project.title.clone(), project.images.len());
    if controller
        .load(narration, &project.script_lines(), &project.timing_opts())
        .is_err()
    {
        let frame = controller.tick();
        let error = controller.last_error().unwrap_or("narration unavailable").to_owned();
        controller.teardown();
        return report_unavailable(&karaoke_line(&frame, project.images.len()), &error);
    }
    controller.play()?;

    let mut stderr = std::io::stderr().lock();
    let mut last = Instant::now();
    loop {
        std::thread::sleep(refresh);
        let now = Instant::now();
        advance(controller.output_mut(), (now - last).as_secs_f64())?;
        last = now;

        let frame = controller.tick();
        if frame.state != PreviewState::Playing {
            break;
        }
        write!(stderr, "\r\x1b[2K{}", karaoke_line(&frame, project.images.len()))?;
        stderr.flush()?;
    }
    writeln!(stderr, "\r\x1b[2K{}", project.title)?;
    controller.teardown();
    Ok(())
}

/// The preview degrades to a title-only line instead of failing the command.
fn report_unavailable(line: &str, error: &str) -> anyhow::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{line}")?;
    writeln!(stderr, "preview unavailable: {error}")?;
    Ok(())
}

fn karaoke_line(frame: &PreviewFrame, images: usize) -> String {
    let image = frame
        .image_index
        .map_or_else(|| "-".to_owned(), |i| format!("{}/{images}", i + 1));
    let text = match &frame.title {
        Some(title) => title.clone(),
        None => frame
            .words
            .iter()
            .map(|w| match w.state {
                WordState::Spoken => w.text.clone(),
                WordState::Current => format!("\x1b[1;33m{}\x1b[0m", w.text),
                WordState::Upcoming => " ".repeat(w.text.chars().count()),
            })
            .collect::<Vec<_>>()
            .join(" "),
    };
    let mute = if frame.muted { " (muted)" } else { "" };
    format!("{:6.2}s [img {image}]{mute} {text}", frame.elapsed)
}
