//! Difference boxes: PDF space to surface space, and drawing.
//!
//! Boxes arrive as `[x1, y1, x2, y2]` in PDF points with the origin at the
//! bottom-left of the page. Surfaces have their origin at the top-left, so
//! the Y axis flips against the surface's *displayed* height.

use crate::error::Column;
use crate::model::ChangeKind;
use image::{Pixel, Rgba, RgbaImage};

/// Fill opacity of a difference box.
const FILL_ALPHA: u8 = 51; // 0.2
/// Border opacity of a difference box.
const BORDER_ALPHA: u8 = 204; // 0.8
/// Border thickness in pixels.
const BORDER_PX: u32 = 2;

/// A box in surface space, origin top-left, in displayed pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Place `bbox` on a surface displayed `displayed_height` pixels tall, one
/// pixel per point.
///
/// `left = x1`, `top = max(0, H − y2)`, `width = x2 − x1`, `height = y2 − y1`.
pub fn overlay_box(bbox: [f32; 4], displayed_height: f32) -> OverlayBox {
    let [x1, y1, x2, y2] = bbox;
    OverlayBox {
        left: x1,
        top: (displayed_height - y2).max(0.0),
        width: x2 - x1,
        height: y2 - y1,
    }
}

/// Like [`overlay_box`] for a surface showing `px_per_point` displayed
/// pixels per PDF point.
pub fn overlay_box_scaled(bbox: [f32; 4], displayed_height: f32, px_per_point: f32) -> OverlayBox {
    overlay_box(bbox.map(|v| v * px_per_point), displayed_height)
}

/// Fill and border colours for one kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    pub fill: Rgba<u8>,
    pub border: Rgba<u8>,
}

impl OverlayStyle {
    pub fn for_kind(kind: ChangeKind) -> Self {
        let [r, g, b] = parse_hex(kind.color());
        Self {
            fill: Rgba([r, g, b, FILL_ALPHA]),
            border: Rgba([r, g, b, BORDER_ALPHA]),
        }
    }
}

/// Columns a change is drawn on: removals on the original, additions on
/// the revision, modifications on both.
pub fn columns_for(kind: ChangeKind) -> &'static [Column] {
    match kind {
        ChangeKind::Deletion => &[Column::Left],
        ChangeKind::Addition => &[Column::Right],
        ChangeKind::Modification => &[Column::Left, Column::Right],
    }
}

fn parse_hex(color: &str) -> [u8; 3] {
    let hex = color.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    [channel(0), channel(2), channel(4)]
}

/// Blend `b` onto `img`, clipped to the image. Returns `false` when the box
/// lies entirely outside.
pub fn draw_overlay(img: &mut RgbaImage, b: &OverlayBox, style: &OverlayStyle) -> bool {
    let (w, h) = img.dimensions();
    let x0 = b.left.floor().max(0.0) as u32;
    let y0 = b.top.floor().max(0.0) as u32;
    let x1 = ((b.left + b.width).ceil().max(0.0) as u32).min(w);
    let y1 = ((b.top + b.height).ceil().max(0.0) as u32).min(h);
    if x0 >= x1 || y0 >= y1 {
        return false;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let edge = x < x0 + BORDER_PX
                || x + BORDER_PX >= x1
                || y < y0 + BORDER_PX
                || y + BORDER_PX >= y1;
            let color = if edge { style.border } else { style.fill };
            img.get_pixel_mut(x, y).blend(&color);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn y_flip_uses_displayed_height() {
        let b = overlay_box([10.0, 50.0, 110.0, 90.0], 200.0);
        assert_eq!(
            b,
            OverlayBox {
                left: 10.0,
                top: 110.0,
                width: 100.0,
                height: 40.0
            }
        );
    }

    #[test]
    fn top_is_clamped_at_zero() {
        let b = overlay_box([0.0, 150.0, 20.0, 250.0], 200.0);
        assert_eq!(b.top, 0.0);
        assert_eq!(b.height, 100.0);
    }

    #[test]
    fn scaled_box_at_render_scale() {
        // 200 pt tall page rendered at 1.5x is displayed 300 px tall.
        let b = overlay_box_scaled([10.0, 50.0, 110.0, 90.0], 300.0, 1.5);
        assert_eq!(b.left, 15.0);
        assert_eq!(b.top, 165.0);
        assert_eq!(b.width, 150.0);
        assert_eq!(b.height, 60.0);
    }

    #[test]
    fn styles_follow_kind_colours() {
        let add = OverlayStyle::for_kind(ChangeKind::Addition);
        assert_eq!(add.fill, Rgba([0x22, 0xc5, 0x5e, FILL_ALPHA]));
        assert!(add.border[3] > add.fill[3]);
        let del = OverlayStyle::for_kind(ChangeKind::Deletion);
        assert_eq!(del.border, Rgba([0xef, 0x44, 0x44, BORDER_ALPHA]));
    }

    #[test]
    fn columns_per_kind() {
        assert_eq!(columns_for(ChangeKind::Deletion), &[Column::Left]);
        assert_eq!(columns_for(ChangeKind::Addition), &[Column::Right]);
        assert_eq!(columns_for(ChangeKind::Modification).len(), 2);
    }

    #[test]
    fn draw_tints_inside_and_clips_outside() {
        let mut img = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        let style = OverlayStyle::for_kind(ChangeKind::Deletion);
        let b = OverlayBox {
            left: 10.0,
            top: 10.0,
            width: 100.0,
            height: 20.0,
        };
        assert!(draw_overlay(&mut img, &b, &style));

        let border = img.get_pixel(10, 10);
        let fill = img.get_pixel(20, 20);
        let outside = img.get_pixel(5, 5);
        assert_eq!(*outside, Rgba([255, 255, 255, 255]));
        assert!(fill[1] < 255, "fill tints green channel down");
        assert!(border[1] < fill[1], "border is more opaque");

        let off = OverlayBox {
            left: 60.0,
            top: 0.0,
            width: 5.0,
            height: 5.0,
        };
        assert!(!draw_overlay(&mut img, &off, &style));
    }
}
