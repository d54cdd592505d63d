use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::color::Rgba;
use crate::foundation::core::{Canvas, FrameRgba, Fps};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::foundation::math::mul_div255_u16;

/// How rendered frames become an MP4 file.
#[derive(Clone, Debug)]
pub struct EncodeSettings {
    pub canvas: Canvas,
    pub fps: Fps,
    /// Transparent layers are flattened over this color before encoding, so
    /// overlay sequences encode the way they preview.
    pub flatten_over: Rgba,
    pub overwrite: bool,
}

impl EncodeSettings {
    pub fn new(canvas: Canvas, fps: Fps) -> Self {
        Self {
            canvas,
            fps,
            flatten_over: Rgba::BLACK,
            overwrite: true,
        }
    }

    fn validate(&self) -> TrailvizResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        Fps::new(self.fps.num, self.fps.den)?;
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(TrailvizError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> TrailvizResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams raw RGBA frames to the system `ffmpeg` binary and writes a
/// libx264/yuv420p MP4. Using the system binary keeps this crate free of
/// native FFmpeg dev header/lib requirements.
pub struct Mp4Writer {
    settings: EncodeSettings,
    bg: [u8; 3],
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl Mp4Writer {
    pub fn create(out_path: impl Into<PathBuf>, settings: EncodeSettings) -> TrailvizResult<Self> {
        settings.validate()?;
        let out_path: PathBuf = out_path.into();
        ensure_parent_dir(&out_path)?;

        if !settings.overwrite && out_path.exists() {
            return Err(TrailvizError::validation(format!(
                "output file '{}' already exists",
                out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(TrailvizError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = spawn_ffmpeg(&out_path, &settings)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrailvizError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        let [r, g, b, _] = settings.flatten_over.to_rgba8();
        Ok(Self {
            scratch: vec![0u8; settings.canvas.pixel_count() * 4],
            settings,
            bg: [r, g, b],
            child,
            stdin: Some(stdin),
        })
    }

    pub fn write_frame(&mut self, frame: &FrameRgba) -> TrailvizResult<()> {
        frame.expect_size(self.settings.canvas)?;

        for (d, s) in self
            .scratch
            .chunks_exact_mut(4)
            .zip(frame.data.chunks_exact(4))
        {
            let px = flatten_pixel([s[0], s[1], s[2], s[3]], frame.premultiplied, self.bg);
            d.copy_from_slice(&px);
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TrailvizError::encode("mp4 writer is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            TrailvizError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    pub fn finish(mut self) -> TrailvizResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            TrailvizError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrailvizError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn spawn_ffmpeg(out_path: &Path, settings: &EncodeSettings) -> TrailvizResult<Child> {
    let mut cmd = Command::new("ffmpeg");
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    cmd.arg(if settings.overwrite { "-y" } else { "-n" });
    cmd.args(["-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba"]);
    cmd.arg("-s").arg(format!(
        "{}x{}",
        settings.canvas.width, settings.canvas.height
    ));
    // `-r` accepts a rational, so num/den passes through unrounded.
    cmd.arg("-r")
        .arg(format!("{}/{}", settings.fps.num, settings.fps.den));
    cmd.args([
        "-i", "pipe:0", "-an", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags",
        "+faststart",
    ]);
    cmd.arg(out_path);

    cmd.spawn().map_err(|e| {
        TrailvizError::encode(format!(
            "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
        ))
    })
}

/// Composite one RGBA pixel over an opaque background color.
fn flatten_pixel(src: [u8; 4], premultiplied: bool, bg: [u8; 3]) -> [u8; 4] {
    let a = u16::from(src[3]);
    if a == 255 {
        return [src[0], src[1], src[2], 255];
    }

    let inv = 255u16 - a;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let fg = if premultiplied {
            u16::from(src[c])
        } else {
            mul_div255_u16(u16::from(src[c]), a)
        };
        out[c] = (fg + mul_div255_u16(u16::from(bg[c]), inv)).min(255) as u8;
    }
    out[3] = 255;
    out
}

/// Write one frame as PNG (alpha preserved, unpremultiplied on the way out).
pub fn save_png(frame: &FrameRgba, path: &Path) -> TrailvizResult<()> {
    ensure_parent_dir(path)?;

    let mut data = frame.data.clone();
    if frame.premultiplied {
        unpremultiply_in_place(&mut data);
    }

    let img = image::RgbaImage::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| TrailvizError::encode("frame buffer does not match its dimensions"))?;
    img.save(path)
        .map_err(|e| TrailvizError::encode(format!("failed to write '{}': {e}", path.display())))
}

fn unpremultiply_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((u16::from(px[c]) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(width: u32, height: u32, fps: u32) -> EncodeSettings {
        EncodeSettings::new(Canvas { width, height }, Fps { num: fps, den: 1 })
    }

    #[test]
    fn validation_catches_bad_dimensions_and_fps() {
        assert!(settings(0, 10, 30).validate().is_err());
        assert!(settings(11, 10, 30).validate().is_err());
        assert!(settings(10, 10, 0).validate().is_err());
        assert!(settings(10, 10, 30).validate().is_ok());
    }

    #[test]
    fn flatten_premul_over_black_keeps_premul_rgb() {
        // Premultiplied red @ 50% alpha stays 128,0,0 over black.
        let out = flatten_pixel([128, 0, 0, 128], true, [0, 0, 0]);
        assert_eq!(out, [128, 0, 0, 255]);
    }

    #[test]
    fn flatten_straight_over_black_scales_rgb() {
        // Straight red @ 50% alpha becomes 128,0,0 over black.
        let out = flatten_pixel([255, 0, 0, 128], false, [0, 0, 0]);
        assert_eq!(out, [128, 0, 0, 255]);
    }

    #[test]
    fn flatten_transparent_shows_the_background() {
        let out = flatten_pixel([0, 0, 0, 0], true, [9, 8, 7]);
        assert_eq!(out, [9, 8, 7, 255]);
    }

    #[test]
    fn unpremultiply_restores_straight_channels() {
        let mut data = vec![128u8, 64u8, 0u8, 128u8];
        unpremultiply_in_place(&mut data);
        assert_eq!(data[0], 255);
        assert_eq!(data[1], 128);
        assert_eq!(data[3], 128);
    }
}
