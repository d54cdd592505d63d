use std::path::{Path, PathBuf};

use crate::foundation::core::FrameRgba;
use crate::foundation::error::TrailvizResult;

#[cfg(not(feature = "media-ffmpeg"))]
use crate::foundation::error::TrailvizError;

/// Probed metadata of a background video source.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
}

impl VideoSourceInfo {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        f64::from(self.fps_num) / f64::from(self.fps_den)
    }
}

#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> TrailvizResult<VideoSourceInfo> {
    use crate::foundation::error::TrailvizError;

    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| TrailvizError::render(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(TrailvizError::render(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| TrailvizError::render(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            TrailvizError::render(format!("'{}' has no video stream", source_path.display()))
        })?;
    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            return Err(TrailvizError::render(
                "ffprobe reported no dimensions for the video stream",
            ));
        }
    };

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| TrailvizError::render("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> TrailvizResult<VideoSourceInfo> {
    Err(TrailvizError::render(
        "background videos require the 'media-ffmpeg' feature",
    ))
}

/// Decode up to `frame_count` straight-alpha RGBA frames starting at frame 0.
#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frames(
    source: &VideoSourceInfo,
    frame_count: u32,
) -> TrailvizResult<Vec<FrameRgba>> {
    use crate::foundation::error::TrailvizError;

    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error"])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| TrailvizError::render(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(TrailvizError::render(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let frame_len = source.width as usize * source.height as usize * 4;
    if frame_len == 0 {
        return Err(TrailvizError::render("video source reports zero-sized frames"));
    }
    if out.stdout.is_empty() || !out.stdout.len().is_multiple_of(frame_len) {
        return Err(TrailvizError::render(format!(
            "raw video stream is {} bytes, not a whole number of {frame_len}-byte frames",
            out.stdout.len()
        )));
    }

    Ok(out
        .stdout
        .chunks_exact(frame_len)
        .take(frame_count as usize)
        .map(|chunk| FrameRgba {
            width: source.width,
            height: source.height,
            data: chunk.to_vec(),
            premultiplied: false,
        })
        .collect())
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frames(
    _source: &VideoSourceInfo,
    _frame_count: u32,
) -> TrailvizResult<Vec<FrameRgba>> {
    Err(TrailvizError::render(
        "background videos require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut it = s.split('/');
    let num = it.next()?.trim().parse::<u32>().ok()?;
    let den = match it.next() {
        Some(d) => d.trim().parse::<u32>().ok()?,
        None => 1,
    };
    if it.next().is_some() || den == 0 {
        return None;
    }
    Some((num, den))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_fps_handles_zero_den() {
        let info = VideoSourceInfo {
            source_path: PathBuf::from("clip.mp4"),
            width: 64,
            height: 64,
            fps_num: 30000,
            fps_den: 1001,
            duration_sec: 1.0,
        };
        assert!((info.source_fps() - 29.97).abs() < 0.01);

        let broken = VideoSourceInfo {
            fps_den: 0,
            ..info
        };
        assert_eq!(broken.source_fps(), 0.0);
    }

    #[cfg(feature = "media-ffmpeg")]
    #[test]
    fn ff_ratio_parsing() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("25"), Some((25, 1)));
        assert_eq!(parse_ff_ratio("30/0"), None);
        assert_eq!(parse_ff_ratio("a/b"), None);
    }
}
