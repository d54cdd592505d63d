use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trailviz", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame of a trail job as a PNG.
    Frame(FrameArgs),
    /// Render a trail job as an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input job JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input job JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Background color for flattening transparent layers, as #RRGGBB.
    #[arg(long, default_value = "#000000")]
    flatten: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn read_job_json(path: &Path) -> anyhow::Result<trailviz::TrailJob> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let r = BufReader::new(f);
    let job: trailviz::TrailJob = serde_json::from_reader(r).with_context(|| "parse job JSON")?;
    Ok(job)
}

struct PreparedJob {
    canvas: trailviz::Canvas,
    tracks: trailviz::TrackSet,
    visible: Option<trailviz::Visibility>,
    background: Option<Vec<trailviz::FrameRgba>>,
    renderer: trailviz::TrailRenderer,
    fps: trailviz::Fps,
}

fn prepare(job: &trailviz::TrailJob) -> anyhow::Result<PreparedJob> {
    job.validate()?;

    let canvas = job.canvas;
    let tracks = job.track_set()?;
    let visible = job.visibility()?;
    let style = job.style.resolve()?;

    let background = match &job.background {
        Some(source) => {
            let info = trailviz::probe_video(Path::new(source))?;
            let frames = trailviz::decode_video_frames(&info, tracks.frames() as u32)?;
            Some(frames)
        }
        None => None,
    };

    Ok(PreparedJob {
        canvas,
        renderer: trailviz::TrailRenderer::new(canvas, style),
        tracks,
        visible,
        background,
        fps: job.fps,
    })
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.in_path)?;
    let prepared = prepare(&job)?;

    if args.frame >= prepared.tracks.frames() {
        anyhow::bail!(
            "frame {} out of range ({} frames)",
            args.frame,
            prepared.tracks.frames()
        );
    }

    let frames = prepared.renderer.render(
        &prepared.tracks,
        prepared.visible.as_ref(),
        prepared.background.as_deref(),
    )?;
    trailviz::save_png(&frames[args.frame], &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.in_path)?;
    let prepared = prepare(&job)?;

    let flatten = trailviz::ColorSpec::Named(args.flatten)
        .resolve()
        .context("parse --flatten color")?;

    let frames = prepared.renderer.render(
        &prepared.tracks,
        prepared.visible.as_ref(),
        prepared.background.as_deref(),
    )?;

    let mut settings = trailviz::EncodeSettings::new(prepared.canvas, prepared.fps);
    settings.flatten_over = flatten;
    let mut writer = trailviz::Mp4Writer::create(&args.out, settings)?;
    for frame in &frames {
        writer.write_frame(frame)?;
    }
    writer.finish()?;

    eprintln!("wrote {} ({} frames)", args.out.display(), frames.len());
    Ok(())
}
