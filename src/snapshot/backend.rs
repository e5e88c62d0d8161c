//! Visual capture of application state.
//!
//! A capture backend turns the current values into a PNG image. The
//! built-in [`ValueRenderer`] draws a text panel of inputs, outputs and
//! exports onto a [`Framebuffer`] using font8x8 glyphs, which keeps the
//! image byte-stable for identical values.

use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;

use super::types::{SnapshotError, SnapshotResult, ValueMap, ValueSnapshot};

const GLYPH_SIZE: u32 = 8;
const LINE_HEIGHT: u32 = 12;
const PADDING: u32 = 8;

/// Result of a capture operation
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// PNG-encoded image data
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for capture backends
pub trait CaptureBackend: Send {
    /// Render the given values and return the encoded image
    fn capture(&mut self, values: &ValueSnapshot) -> SnapshotResult<CaptureResult>;

    /// Source type identifier recorded in session metadata
    fn source_type(&self) -> &str;
}

/// An RGB pixel buffer with a minimal drawing API
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    /// RGB pixel buffer (row-major, 3 bytes per pixel)
    buffer: Vec<u8>,
}

impl Framebuffer {
    /// Create a new framebuffer initialized to black
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer: vec![0u8; (width * height * 3) as usize],
        }
    }

    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Load a framebuffer from PNG image bytes
    pub fn from_png_bytes(data: &[u8]) -> SnapshotResult<Self> {
        let img = image::load_from_memory(data)
            .map_err(|e| SnapshotError::Capture(format!("Failed to load PNG: {}", e)))?;
        let rgb = img.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the buffer
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text using font8x8 glyphs. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x + GLYPH_SIZE > self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, fg, bg);
            cursor_x += GLYPH_SIZE;
        }
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, fg: [u8; 3], bg: [u8; 3]) {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            let py = y + row_idx as u32;
            if py >= self.height {
                break;
            }
            for bit in 0..GLYPH_SIZE {
                // font8x8 stores LSB as leftmost pixel
                let color = if (row >> bit) & 1 == 1 { fg } else { bg };
                self.set_pixel(x + bit, py, color);
            }
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y * self.width + x) * 3) as usize;
        [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.buffer[idx..idx + 3].copy_from_slice(&color);
    }

    pub fn to_image(&self) -> SnapshotResult<RgbImage> {
        ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| SnapshotError::Capture("Buffer size does not match dimensions".to_string()))
    }

    /// Encode the framebuffer as PNG bytes
    pub fn to_png(&self) -> SnapshotResult<Vec<u8>> {
        let img = self.to_image()?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| SnapshotError::Capture(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

/// Renders a value panel: one section per field, one line per name
#[derive(Debug, Clone)]
pub struct ValueRenderer {
    pub width: u32,
    pub background: [u8; 3],
    pub foreground: [u8; 3],
    pub heading: [u8; 3],
}

impl Default for ValueRenderer {
    fn default() -> Self {
        Self {
            width: 640,
            background: [250, 250, 250],
            foreground: [30, 30, 30],
            heading: [36, 114, 200],
        }
    }
}

impl ValueRenderer {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    /// Text lines for the panel, with a flag marking section headings
    fn lines(values: &ValueSnapshot) -> Vec<(bool, String)> {
        let mut lines = Vec::new();
        let sections: [(&str, &ValueMap); 3] = [
            ("input", &values.input),
            ("output", &values.output),
            ("export", &values.export),
        ];
        for (title, map) in sections {
            lines.push((true, title.to_string()));
            for (name, value) in map {
                lines.push((false, format!("  {} = {}", name, value)));
            }
        }
        lines
    }
}

impl CaptureBackend for ValueRenderer {
    fn capture(&mut self, values: &ValueSnapshot) -> SnapshotResult<CaptureResult> {
        let lines = Self::lines(values);
        let height = PADDING * 2 + LINE_HEIGHT * lines.len() as u32;
        let mut fb = Framebuffer::with_color(self.width, height, self.background);

        for (idx, (is_heading, text)) in lines.iter().enumerate() {
            let y = PADDING + idx as u32 * LINE_HEIGHT;
            let fg = if *is_heading { self.heading } else { self.foreground };
            fb.draw_text(PADDING, y, text, fg, self.background);
        }

        Ok(CaptureResult {
            image_data: fb.to_png()?,
            width: fb.width(),
            height: fb.height(),
        })
    }

    fn source_type(&self) -> &str {
        "value_panel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_framebuffer_draw_rect() {
        let mut fb = Framebuffer::new(20, 20);
        fb.draw_rect(5, 5, 10, 10, [255, 0, 0]);

        assert_eq!(fb.get_pixel(4, 4), [0, 0, 0]);
        assert_eq!(fb.get_pixel(5, 5), [255, 0, 0]);
        assert_eq!(fb.get_pixel(14, 14), [255, 0, 0]);
        assert_eq!(fb.get_pixel(15, 15), [0, 0, 0]);
    }

    #[test]
    fn test_framebuffer_draw_text() {
        let mut fb = Framebuffer::new(80, 16);
        fb.draw_text(0, 0, "Hi", [255, 255, 255], [0, 0, 0]);

        let lit = (0..8).flat_map(|y| (0..8).map(move |x| (x, y)))
            .any(|(x, y)| fb.get_pixel(x, y) == [255, 255, 255]);
        assert!(lit, "Character 'H' should have some foreground pixels");
    }

    #[test]
    fn test_framebuffer_png_roundtrip() {
        let mut fb = Framebuffer::with_color(32, 32, [100, 150, 200]);
        fb.draw_rect(8, 8, 16, 16, [255, 0, 0]);

        let fb2 = Framebuffer::from_png_bytes(&fb.to_png().unwrap()).unwrap();
        assert_eq!(fb2.width(), 32);
        assert_eq!(fb2.get_pixel(0, 0), [100, 150, 200]);
        assert_eq!(fb2.get_pixel(10, 10), [255, 0, 0]);
    }

    #[test]
    fn test_value_renderer_is_deterministic() {
        let mut values = ValueSnapshot::default();
        values.input.insert("n".into(), json!(4));
        values.output.insert("sum".into(), json!("14"));

        let mut renderer = ValueRenderer::default();
        let first = renderer.capture(&values).unwrap();
        let second = renderer.capture(&values).unwrap();

        assert_eq!(&first.image_data[0..4], &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(first.image_data, second.image_data);
        // 3 headings + 2 value lines
        assert_eq!(first.height, PADDING * 2 + LINE_HEIGHT * 5);
    }
}
