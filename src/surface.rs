use kurbo::{PathEl, Point, Shape};

use crate::color::Rgba;
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};

/// Straight-alpha RGBA8 brush carried through parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// One transparent RGBA drawing layer backed by a `vello_cpu` render context.
///
/// All vector drawing in the crate funnels through here; callers get the
/// finished pixels back as a premultiplied [`FrameRgba`] via
/// [`DrawSurface::into_frame`].
pub struct DrawSurface {
    ctx: vello_cpu::RenderContext,
    width: u16,
    height: u16,
}

impl DrawSurface {
    pub fn new(canvas: Canvas) -> TrailvizResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| TrailvizError::render("surface width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| TrailvizError::render("surface height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(Self { ctx, width, height })
    }

    /// Stroke one line segment with round caps.
    pub fn stroke_segment(
        &mut self,
        p1: Point,
        p2: Point,
        width: f64,
        rgb: [u8; 3],
        alpha: f64,
    ) {
        let mut path = vello_cpu::kurbo::BezPath::new();
        path.move_to(vello_cpu::kurbo::Point::new(p1.x, p1.y));
        path.line_to(vello_cpu::kurbo::Point::new(p2.x, p2.y));

        self.ctx.set_stroke(
            vello_cpu::kurbo::Stroke::new(width).with_caps(vello_cpu::kurbo::Cap::Round),
        );
        self.ctx.set_paint(color8(rgb, alpha));
        self.ctx.stroke_path(&path);
    }

    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Rgba) {
        let circle = kurbo::Circle::new(center, radius);
        self.ctx.set_paint(color_paint(color));
        self.ctx.fill_path(&to_cpu_path(&circle.to_path(0.1)));
    }

    pub fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Rgba) {
        let circle = kurbo::Circle::new(center, radius);
        self.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
        self.ctx.set_paint(color_paint(color));
        self.ctx.stroke_path(&to_cpu_path(&circle.to_path(0.1)));
    }

    /// Fill an arbitrary path.
    pub fn fill_path(&mut self, path: &kurbo::BezPath, color: Rgba) {
        self.ctx.set_paint(color_paint(color));
        self.ctx.fill_path(&to_cpu_path(path));
    }

    /// Fill a closed polygon given by its vertices.
    pub fn fill_polygon(&mut self, vertices: &[Point], color: Rgba) {
        let Some(path) = polygon_path(vertices) else {
            return;
        };
        self.ctx.set_paint(color_paint(color));
        self.ctx.fill_path(&path);
    }

    /// Stroke a polyline (closed when `close` is set) with round joins.
    pub fn stroke_polygon(&mut self, vertices: &[Point], width: f64, color: Rgba, close: bool) {
        let Some(mut path) = polygon_open_path(vertices) else {
            return;
        };
        if close {
            path.close_path();
        }
        self.ctx.set_stroke(
            vello_cpu::kurbo::Stroke::new(width)
                .with_caps(vello_cpu::kurbo::Cap::Round)
                .with_join(vello_cpu::kurbo::Join::Round),
        );
        self.ctx.set_paint(color_paint(color));
        self.ctx.stroke_path(&path);
    }

    /// Fill the glyphs of a shaped text layout, offset by `(dx, dy)`.
    pub fn fill_text_layout(
        &mut self,
        layout: &parley::Layout<TextBrush>,
        font: &vello_cpu::peniko::FontData,
        dx: f64,
        dy: f64,
    ) {
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((dx, dy)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    /// Rasterize everything drawn so far into a fresh premultiplied frame.
    pub fn into_frame(mut self) -> FrameRgba {
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        FrameRgba {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }
}

fn color8(rgb: [u8; 3], alpha: f64) -> vello_cpu::peniko::Color {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    vello_cpu::peniko::Color::from_rgba8(rgb[0], rgb[1], rgb[2], a)
}

fn color_paint(color: Rgba) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = color.to_rgba8();
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn polygon_open_path(vertices: &[Point]) -> Option<vello_cpu::kurbo::BezPath> {
    let (first, rest) = vertices.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut path = vello_cpu::kurbo::BezPath::new();
    path.move_to(vello_cpu::kurbo::Point::new(first.x, first.y));
    for p in rest {
        path.line_to(vello_cpu::kurbo::Point::new(p.x, p.y));
    }
    Some(path)
}

fn polygon_path(vertices: &[Point]) -> Option<vello_cpu::kurbo::BezPath> {
    let mut path = polygon_open_path(vertices)?;
    path.close_path();
    Some(path)
}

fn to_cpu_path(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
