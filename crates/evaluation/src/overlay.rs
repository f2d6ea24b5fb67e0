use crate::font::TextRenderer;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use inference::{Detection, LabelSet};

const PALETTE: [[u8; 3]; 9] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 128, 0],
    [128, 0, 255],
    [0, 128, 255],
];

/// Stable colour for a class ID.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws detections onto the image they were produced from.
pub struct OverlayRenderer {
    text: TextRenderer,
    thickness: u32,
}

impl OverlayRenderer {
    pub fn new(text: TextRenderer) -> Self {
        Self { text, thickness: 2 }
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness.max(1);
        self
    }

    /// Outline each detection in its class colour with a `label: score`
    /// caption above the top-left corner (below it when there is no room).
    pub fn draw(&self, image: &mut RgbImage, detections: &[Detection], labels: &LabelSet) {
        let (width, height) = image.dimensions();

        for det in detections {
            let color = class_color(det.class_id);
            let bbox = det.to_pixels(width, height);

            let x = bbox.xmin.round() as i32;
            let y = bbox.ymin.round() as i32;
            let w = (bbox.width().round() as u32).max(1);
            let h = (bbox.height().round() as u32).max(1);

            for t in 0..self.thickness {
                let grow = 2 * t;
                draw_hollow_rect_mut(
                    image,
                    Rect::at(x - t as i32, y - t as i32).of_size(w + grow, h + grow),
                    color,
                );
            }

            let caption = format!(
                "{}: {:.2}",
                labels.name(det.class_id).unwrap_or("unknown"),
                det.score
            );
            let (tw, th) = self.text.text_size(&caption);
            let pad = 2;
            let label_h = th + 2 * pad;
            let label_y = if y >= label_h as i32 {
                y - label_h as i32
            } else {
                y + h as i32
            };

            draw_filled_rect_mut(
                image,
                Rect::at(x, label_y).of_size(tw + 2 * pad, label_h),
                color,
            );
            self.text.draw(
                image,
                Rgb([0, 0, 0]),
                x + pad as i32,
                label_y + pad as i32,
                &caption,
            );
        }
    }
}
