use crate::color::ColorSpec;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::tracks::{TrackSet, Visibility};
use crate::trail::TrailStyle;

/// Style block of a job file; colors stay as flexible specs until resolved.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrailStyleDef {
    #[serde(default = "default_color")]
    pub color: ColorSpec,
    #[serde(default)]
    pub trail_length: usize,
    #[serde(default = "default_size")]
    pub dot_radius: f64,
    #[serde(default = "default_size")]
    pub trail_width: f64,
    #[serde(default = "default_rim_color")]
    pub rim_color: ColorSpec,
    #[serde(default = "default_rim_opacity")]
    pub rim_opacity: f64,
    #[serde(default = "default_rim_thickness")]
    pub rim_thickness: f64,
}

fn default_color() -> ColorSpec {
    ColorSpec::Named("white".to_string())
}

fn default_rim_color() -> ColorSpec {
    ColorSpec::Named("white".to_string())
}

fn default_size() -> f64 {
    4.0
}

fn default_rim_opacity() -> f64 {
    0.5
}

fn default_rim_thickness() -> f64 {
    1.0
}

impl Default for TrailStyleDef {
    fn default() -> Self {
        Self {
            color: default_color(),
            trail_length: 0,
            dot_radius: default_size(),
            trail_width: default_size(),
            rim_color: default_rim_color(),
            rim_opacity: default_rim_opacity(),
            rim_thickness: default_rim_thickness(),
        }
    }
}

impl TrailStyleDef {
    pub fn resolve(&self) -> TrailvizResult<TrailStyle> {
        Ok(TrailStyle {
            color: self.color.resolve()?,
            trail_length: self.trail_length,
            dot_radius: self.dot_radius,
            trail_width: self.trail_width,
            rim_color: self.rim_color.resolve()?,
            rim_opacity: self.rim_opacity,
            rim_thickness: self.rim_thickness,
        })
    }
}

/// A complete trail-rendering job as read from JSON by the CLI.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrailJob {
    pub canvas: Canvas,
    pub fps: Fps,
    /// (T x N) nested position rows.
    pub tracks: Vec<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<Vec<Vec<bool>>>,
    #[serde(default)]
    pub style: TrailStyleDef,
    /// Optional background video path, decoded via ffmpeg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl TrailJob {
    pub fn validate(&self) -> TrailvizResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        Fps::new(self.fps.num, self.fps.den)?;
        if self.tracks.is_empty() {
            return Err(TrailvizError::validation("job has no track frames"));
        }

        let tracks = self.track_set()?;
        if let Some(vis) = self.visibility()? {
            vis.expect_shape(tracks.frames(), tracks.points())?;
        }
        if !(0.0..=1.0).contains(&self.style.rim_opacity) {
            return Err(TrailvizError::validation("rim_opacity must be in 0..=1"));
        }
        self.style.resolve()?;
        Ok(())
    }

    pub fn track_set(&self) -> TrailvizResult<TrackSet> {
        TrackSet::from_rows(&self.tracks)
    }

    pub fn visibility(&self) -> TrailvizResult<Option<Visibility>> {
        self.visible
            .as_deref()
            .map(Visibility::from_rows)
            .transpose()
    }
}
