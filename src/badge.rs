use kurbo::Point;

use crate::color::Rgba;
use crate::foundation::core::{Canvas, FrameRgba};
use crate::foundation::error::{TrailvizError, TrailvizResult};
use crate::surface::{DrawSurface, TextBrush};

/// Appearance of a labeled circular badge.
#[derive(Clone, Debug)]
pub struct BadgeStyle {
    pub fill: Rgba,
    pub rim_color: Rgba,
    pub rim_width: f64,
    pub diameter: f64,
    /// Transparent margin around the circle, in pixels.
    pub padding: f64,
    pub text_color: Rgba,
}

impl Default for BadgeStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::rgb(1.0, 0.0, 1.0),
            rim_color: Rgba::BLACK,
            rim_width: 2.0,
            diameter: 30.0,
            padding: 10.0,
            text_color: Rgba::BLACK,
        }
    }
}

/// Renders labeled circle sprites: a filled disc, a rim stroke, and a short
/// label centered inside, sized at 0.65x the diameter.
///
/// Holds the parley font/layout contexts so fonts register once; render a
/// badge per track up front and stamp the sprites onto frame layers.
pub struct BadgeRenderer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl Default for BadgeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BadgeRenderer {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    pub fn render_badge(
        &mut self,
        style: &BadgeStyle,
        label: &str,
        font_bytes: &[u8],
    ) -> TrailvizResult<FrameRgba> {
        if style.diameter <= 0.0 {
            return Err(TrailvizError::validation("badge diameter must be > 0"));
        }

        let size = (style.diameter + style.padding).ceil().max(1.0) as u32;
        let canvas = Canvas::new(size, size)?;
        let center = Point::new(f64::from(size) / 2.0, f64::from(size) / 2.0);
        let radius = style.diameter / 2.0;

        let mut surface = DrawSurface::new(canvas)?;
        surface.fill_circle(center, radius, style.fill);
        if style.rim_width > 0.0 {
            // Stroke just inside the disc so the rim never clips at the edge.
            let rim_radius = (radius - style.rim_width / 2.0).max(0.0);
            surface.stroke_circle(center, rim_radius, style.rim_width, style.rim_color);
        }

        if !label.is_empty() {
            let [r, g, b, a] = style.text_color.to_rgba8();
            let brush = TextBrush { r, g, b, a };
            let size_px = (style.diameter * 0.65) as f32;
            let (layout, font) = self.layout_label(label, font_bytes, size_px, brush)?;

            let dx = center.x - f64::from(layout.width()) / 2.0;
            let dy = center.y - f64::from(layout.height()) / 2.0;
            surface.fill_text_layout(&layout, &font, dx, dy);
        }

        Ok(surface.into_frame())
    }

    fn layout_label(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrush,
    ) -> TrailvizResult<(parley::Layout<TextBrush>, vello_cpu::peniko::FontData)> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(TrailvizError::validation(
                "badge text size must be finite and > 0",
            ));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            TrailvizError::validation("no font families registered from font bytes")
        })?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| TrailvizError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            0,
        );
        Ok((layout, font))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_sprite_has_diameter_plus_padding_extent() {
        let mut r = BadgeRenderer::new();
        let style = BadgeStyle {
            diameter: 30.0,
            padding: 10.0,
            ..BadgeStyle::default()
        };
        // Empty label keeps the test independent of any font file.
        let sprite = r.render_badge(&style, "", &[]).unwrap();
        assert_eq!(sprite.width, 40);
        assert_eq!(sprite.height, 40);

        // Disc center is filled, outside the disc stays transparent.
        assert!(sprite.pixel(20, 20)[3] > 0);
        assert_eq!(sprite.pixel(1, 1)[3], 0);
    }

    #[test]
    fn zero_diameter_is_rejected() {
        let mut r = BadgeRenderer::new();
        let style = BadgeStyle {
            diameter: 0.0,
            ..BadgeStyle::default()
        };
        assert!(r.render_badge(&style, "1", &[]).is_err());
    }

    #[test]
    fn labeled_badge_without_font_fails_cleanly() {
        let mut r = BadgeRenderer::new();
        let err = r.render_badge(&BadgeStyle::default(), "7", &[]);
        assert!(err.is_err());
    }
}
