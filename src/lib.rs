//! Trailviz renders tracked-point overlays for paper figures and videos.
//!
//! The core is a tapering motion-trail renderer: given (T x N) track
//! positions and a visibility mask, it draws each point's recent path as a
//! width- and opacity-tapered polyline plus a rimmed dot at the current
//! position, one RGBA layer per frame, optionally composited over a
//! background sequence ([`TrailRenderer`]).
//!
//! Around it sit the pieces the figures need:
//!
//! - a depth-aware variant that paints far-to-near ([`DepthTrailRenderer`])
//! - arrow annotations and labeled circular badges ([`arrow`], [`badge`])
//! - film-strip montages and an image-stack motion-blur composite
//!   ([`strip`], [`stack`])
//! - a fixed-order layer compositor for edited-video comparisons ([`overlay`])
//! - PNG/MP4 output via the `image` crate and the system `ffmpeg` binary
//!
//! Rasterization is CPU-only (`vello_cpu`); rendering is sequential, frame
//! by frame, with every layer freshly allocated.
#![forbid(unsafe_code)]

pub mod arrow;
pub mod badge;
pub mod color;
pub mod composite;
pub mod depth;
pub mod effects;
pub mod encode;
mod foundation;
pub mod job;
pub mod media;
pub mod overlay;
pub mod stack;
pub mod strip;
pub mod surface;
pub mod tracks;
pub mod trail;
pub mod tween;

pub use arrow::{ArrowGeometry, ArrowStyle, arrow_outline, draw_arrow};
pub use badge::{BadgeRenderer, BadgeStyle};
pub use color::{ColorSpec, Rgba};
pub use depth::{DepthTrailRenderer, DepthTrailStyle};
pub use effects::{DropShadow, gaussian_blur, with_drop_shadow};
pub use encode::{EncodeSettings, Mp4Writer, ensure_parent_dir, is_ffmpeg_on_path, save_png};
pub use foundation::core::{
    Affine, BezPath, Canvas, FrameRgba, Fps, Point, Rect, Rgba8Premul, Vec2,
};
pub use foundation::error::{TrailvizError, TrailvizResult};
pub use job::{TrailJob, TrailStyleDef};
pub use media::{VideoSourceInfo, decode_video_frames, probe_video};
pub use overlay::{LayerOpacities, OverlayScene, render_overlay_frame, track_hues};
pub use stack::{StackOptions, image_stack};
pub use strip::{StripOptions, film_strip};
pub use surface::{DrawSurface, TextBrush};
pub use tracks::{DepthTrackSet, TrackSet, Visibility};
pub use trail::{TrailRenderer, TrailStyle};
pub use tween::{Ease, Tween};
