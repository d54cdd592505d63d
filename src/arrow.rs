use kurbo::{Point, Vec2};

use crate::color::Rgba;
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::surface::DrawSurface;

/// Shape parameters of the arrow outline, in pixels.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ArrowGeometry {
    pub tip_width: f64,
    pub tip_height: f64,
    /// How far the back of the head folds in toward the tip.
    pub tip_dimple: f64,
    pub start_width: f64,
    pub end_width: f64,
}

impl Default for ArrowGeometry {
    fn default() -> Self {
        Self {
            tip_width: 15.0,
            tip_height: 15.0,
            tip_dimple: 5.0,
            start_width: 3.0,
            end_width: 5.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArrowStyle {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f64,
    pub geometry: ArrowGeometry,
}

impl Default for ArrowStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::rgba(0.0, 0.0, 1.0, 0.5),
            stroke: Rgba::BLACK,
            stroke_width: 1.0,
            geometry: ArrowGeometry::default(),
        }
    }
}

/// Closed outline of an arrow from `p0` to `p1`: a shaft tapering from
/// `start_width` to `end_width`, capped by a dimpled triangular head.
///
/// Vertices run dimple-left, tail-left, tail-right, dimple-right, head-right,
/// tip, head-left; closing the polygon yields the filled shape.
pub fn arrow_outline(
    p0: Point,
    p1: Point,
    geometry: &ArrowGeometry,
) -> TrailvizResult<[Point; 7]> {
    let delta = p1 - p0;
    let mag = delta.hypot();
    if mag == 0.0 {
        return Err(TrailvizError::validation(
            "arrow endpoints must not coincide",
        ));
    }

    let dir = delta / mag;
    let right = Vec2::new(-dir.y, dir.x);

    let tip_left = p1 - right * geometry.tip_width - dir * geometry.tip_height;
    let tip_right = p1 + right * geometry.tip_width - dir * geometry.tip_height;
    let dimple = p1 - dir * (geometry.tip_height - geometry.tip_dimple);

    Ok([
        dimple - right * (geometry.end_width / 2.0),
        p0 - right * (geometry.start_width / 2.0),
        p0 + right * (geometry.start_width / 2.0),
        dimple + right * (geometry.end_width / 2.0),
        tip_right,
        p1,
        tip_left,
    ])
}

/// Fill and stroke an arrow onto a surface.
pub fn draw_arrow(
    surface: &mut DrawSurface,
    p0: Point,
    p1: Point,
    style: &ArrowStyle,
) -> TrailvizResult<()> {
    let outline = arrow_outline(p0, p1, &style.geometry)?;
    surface.fill_polygon(&outline, style.fill);
    if style.stroke_width > 0.0 {
        surface.stroke_polygon(&outline, style.stroke_width, style.stroke, true);
    }
    Ok(())
}
