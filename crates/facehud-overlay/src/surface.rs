//! The overlay surface: an RGBA canvas with the drawing primitives used by
//! the annotation loop.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use facehud_core::types::{FaceBox, Landmarks};

/// Detection boxes and landmark dots.
pub const DETECTION_COLOR: Rgba<u8> = Rgba([0, 120, 255, 255]);
pub const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 220, 120, 255]);
/// Identity boxes drawn from match results.
pub const MATCH_COLOR: Rgba<u8> = Rgba([255, 200, 0, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 170]);

const BOX_THICKNESS: u32 = 2;
const TEXT_HEIGHT: f32 = 16.0;
const TEXT_PADDING: i32 = 3;
const LANDMARK_RADIUS: i32 = 1;

/// RGBA overlay canvas sized to the display resolution.
///
/// Text primitives require a font; box and landmark primitives render
/// regardless. The loop clears the surface fully before each tick's draws.
pub struct OverlaySurface {
    canvas: RgbaImage,
    font: Option<FontArc>,
    text_scale: PxScale,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            font,
            text_scale: PxScale::from(TEXT_HEIGHT),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// True when nothing has been drawn since the last clear.
    pub fn is_blank(&self) -> bool {
        self.canvas.pixels().all(|p| p.0[3] == 0)
    }

    /// Reset every pixel to fully transparent.
    pub fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Hollow rectangle with a fixed stroke thickness.
    pub fn draw_box(&mut self, face: &FaceBox, color: Rgba<u8>) {
        let w = face.width.max(1.0) as u32;
        let h = face.height.max(1.0) as u32;

        for inset in 0..BOX_THICKNESS {
            let iw = w.saturating_sub(inset * 2);
            let ih = h.saturating_sub(inset * 2);
            if iw == 0 || ih == 0 {
                break;
            }
            let rect = Rect::at(face.x as i32 + inset as i32, face.y as i32 + inset as i32)
                .of_size(iw, ih);
            draw_hollow_rect_mut(&mut self.canvas, rect, color);
        }
    }

    /// Box plus a filled label tag along its bottom edge.
    pub fn draw_labeled_box(&mut self, face: &FaceBox, label: &str, color: Rgba<u8>) {
        self.draw_box(face, color);
        self.draw_text_lines(
            std::slice::from_ref(&label.to_string()),
            (face.x, face.bottom()),
            color,
        );
    }

    /// One dot per landmark point.
    pub fn draw_landmarks(&mut self, landmarks: &Landmarks, color: Rgba<u8>) {
        for &(x, y) in &landmarks.points {
            draw_filled_circle_mut(&mut self.canvas, (x as i32, y as i32), LANDMARK_RADIUS, color);
        }
    }

    /// Stacked text lines with a filled background, top-left anchored.
    /// No-op without a font.
    pub fn draw_text_block(&mut self, lines: &[String], anchor: (f32, f32)) {
        self.draw_text_lines(lines, anchor, TEXT_BACKGROUND);
    }

    fn draw_text_lines(&mut self, lines: &[String], anchor: (f32, f32), background: Rgba<u8>) {
        let Some(font) = self.font.clone() else {
            return;
        };
        if lines.is_empty() {
            return;
        }

        let line_height = (self.text_scale.y * 1.25) as i32;
        let block_width = lines
            .iter()
            .map(|l| text_size(self.text_scale, &font, l).0)
            .max()
            .unwrap_or(0) as i32;
        let block_height = line_height * lines.len() as i32;

        let x = anchor.0 as i32;
        let y = anchor.1 as i32;

        if block_width > 0 {
            let bg = Rect::at(x - TEXT_PADDING, y - TEXT_PADDING).of_size(
                (block_width + TEXT_PADDING * 2) as u32,
                (block_height + TEXT_PADDING * 2) as u32,
            );
            draw_filled_rect_mut(&mut self.canvas, bg, background);
        }

        for (i, line) in lines.iter().enumerate() {
            draw_text_mut(
                &mut self.canvas,
                TEXT_COLOR,
                x,
                y + i as i32 * line_height,
                self.text_scale,
                &font,
                line,
            );
        }
    }

    /// Alpha-blend the overlay onto an RGB background of the same size.
    /// Dimension mismatches blend over the shared region.
    pub fn composite_over(&self, background: &RgbImage) -> RgbImage {
        let mut out = background.clone();
        let w = out.width().min(self.canvas.width());
        let h = out.height().min(self.canvas.height());
        if (w, h) != (self.canvas.width(), self.canvas.height()) {
            tracing::debug!(
                overlay_w = self.canvas.width(),
                overlay_h = self.canvas.height(),
                background_w = background.width(),
                background_h = background.height(),
                "composite dimension mismatch; blending shared region"
            );
        }

        for y in 0..h {
            for x in 0..w {
                let fg = self.canvas.get_pixel(x, y).0;
                if fg[3] == 0 {
                    continue;
                }
                let alpha = fg[3] as f32 / 255.0;
                let bg = out.get_pixel(x, y).0;
                let blend = |f: u8, b: u8| (f as f32 * alpha + b as f32 * (1.0 - alpha)) as u8;
                out.put_pixel(x, y, Rgb([blend(fg[0], bg[0]), blend(fg[1], bg[1]), blend(fg[2], bg[2])]));
            }
        }

        out
    }
}
