use crate::confusion::ConfusionMatrix;
use crate::error::RenderError;
use crate::font::TextRenderer;
use common::span_debug;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::path::Path;

const HEADER_FILL: Rgb<u8> = Rgb([235, 235, 235]);
const GRID_LINE: Rgb<u8> = Rgb([160, 160, 160]);
const CORNER_CAPTION: &str = "gt/pred";
const CELL_PADDING: u32 = 8;

/// Cell shade for `value` on a `[0, max]` scale: 255 for empty, 0 for the
/// largest cell. `max` is floored at 1.
pub fn intensity(value: f64, max: f64) -> u8 {
    let shade = 255.0 - 255.0 * value / max.max(1.0);
    shade.round().clamp(0.0, 255.0) as u8
}

/// Renders a confusion matrix as a labelled heat map.
///
/// Rows are ground-truth classes and columns predicted classes, both ending
/// with background. Cells range from white (zero) to saturated blue (the
/// largest value) and carry their value as text.
pub struct ConfusionRenderer {
    text: TextRenderer,
    min_cell: u32,
}

impl ConfusionRenderer {
    pub fn new(text: TextRenderer) -> Self {
        Self {
            text,
            min_cell: 48,
        }
    }

    pub fn with_min_cell_size(mut self, min_cell: u32) -> Self {
        self.min_cell = min_cell.max(1);
        self
    }

    /// Heat map of raw counts.
    pub fn render_counts(
        &self,
        matrix: &ConfusionMatrix,
        labels: &[&str],
    ) -> Result<RgbImage, RenderError> {
        let values: Vec<Vec<f64>> = matrix
            .rows()
            .map(|row| row.iter().map(|&c| c as f64).collect())
            .collect();
        self.render_grid(&values, matrix.max() as f64, labels, |v| format!("{v:.0}"))
    }

    /// Heat map of the row-normalized matrix.
    pub fn render_probabilities(
        &self,
        matrix: &ConfusionMatrix,
        labels: &[&str],
    ) -> Result<RgbImage, RenderError> {
        let values = matrix.probabilities();
        self.render_grid(&values, 1.0, labels, |v| format!("{v:.2}"))
    }

    fn render_grid(
        &self,
        values: &[Vec<f64>],
        max: f64,
        labels: &[&str],
        format: impl Fn(f64) -> String,
    ) -> Result<RgbImage, RenderError> {
        let n = values.len();
        let _s = span_debug!("render_confusion", size = n);

        if labels.len() != n {
            return Err(RenderError::LabelMismatch {
                labels: labels.len(),
                size: n,
            });
        }

        let cell_texts: Vec<Vec<String>> = values
            .iter()
            .map(|row| row.iter().map(|&v| format(v)).collect())
            .collect();

        let widest = labels
            .iter()
            .copied()
            .chain(std::iter::once(CORNER_CAPTION))
            .chain(cell_texts.iter().flatten().map(String::as_str))
            .map(|t| self.text.text_size(t).0)
            .max()
            .unwrap_or(0);
        let (_, text_h) = self.text.text_size(CORNER_CAPTION);

        let cell_w = self.min_cell.max(widest + 2 * CELL_PADDING);
        let cell_h = self.min_cell.max(text_h + 2 * CELL_PADDING);
        let side = n as u32 + 1;

        let mut canvas = RgbImage::from_pixel(side * cell_w, side * cell_h, Rgb([255, 255, 255]));

        self.header_cell(&mut canvas, 0, 0, cell_w, cell_h, CORNER_CAPTION);
        for (i, label) in labels.iter().enumerate() {
            let k = i as u32 + 1;
            self.header_cell(&mut canvas, k, 0, cell_w, cell_h, label);
            self.header_cell(&mut canvas, 0, k, cell_w, cell_h, label);
        }

        for (row, (cells, texts)) in values.iter().zip(&cell_texts).enumerate() {
            for (col, (&value, text)) in cells.iter().zip(texts).enumerate() {
                let shade = intensity(value, max);
                let fill = Rgb([shade, shade, 255]);
                let ink = if shade < 128 {
                    Rgb([255, 255, 255])
                } else {
                    Rgb([0, 0, 0])
                };
                let rect = cell_rect(col as u32 + 1, row as u32 + 1, cell_w, cell_h);
                draw_filled_rect_mut(&mut canvas, rect, fill);
                draw_hollow_rect_mut(&mut canvas, rect, GRID_LINE);
                self.centered_text(&mut canvas, rect, ink, text);
            }
        }

        Ok(canvas)
    }

    fn header_cell(&self, canvas: &mut RgbImage, col: u32, row: u32, w: u32, h: u32, text: &str) {
        let rect = cell_rect(col, row, w, h);
        draw_filled_rect_mut(canvas, rect, HEADER_FILL);
        draw_hollow_rect_mut(canvas, rect, GRID_LINE);
        self.centered_text(canvas, rect, Rgb([0, 0, 0]), text);
    }

    fn centered_text(&self, canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>, text: &str) {
        let (tw, th) = self.text.text_size(text);
        let x = rect.left() + (rect.width().saturating_sub(tw) / 2) as i32;
        let y = rect.top() + (rect.height().saturating_sub(th) / 2) as i32;
        self.text.draw(canvas, color, x, y, text);
    }
}

fn cell_rect(col: u32, row: u32, w: u32, h: u32) -> Rect {
    Rect::at((col * w) as i32, (row * h) as i32).of_size(w, h)
}

/// Write an image as PNG, creating parent directories as needed.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RenderError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
