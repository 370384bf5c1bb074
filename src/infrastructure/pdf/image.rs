// Raster images placed in the PDF as DeviceRGB XObjects
use crate::domain::error::ExportError;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<Vec<u8>>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32, pixels: Arc<Vec<u8>>) -> Result<Self, ExportError> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 3 {
            return Err(ExportError::render(format!(
                "image buffer of {} bytes does not match {}x{} RGB",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Decode a PNG of any colour type to RGB, compositing alpha over white.
    pub fn from_png(bytes: &[u8]) -> Result<Self, ExportError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(ExportError::render)?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(ExportError::render)?;
        let data = &buf[..info.buffer_size()];

        let over_white = |c: u8, a: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
        let pixels: Vec<u8> = match info.color_type {
            png::ColorType::Rgb => data.to_vec(),
            png::ColorType::Rgba => data
                .chunks_exact(4)
                .flat_map(|p| [over_white(p[0], p[3]), over_white(p[1], p[3]), over_white(p[2], p[3])])
                .collect(),
            png::ColorType::Grayscale => data.iter().flat_map(|g| [*g, *g, *g]).collect(),
            png::ColorType::GrayscaleAlpha => data
                .chunks_exact(2)
                .flat_map(|p| {
                    let g = over_white(p[0], p[1]);
                    [g, g, g]
                })
                .collect(),
            png::ColorType::Indexed => {
                return Err(ExportError::render("palette PNG was not expanded"));
            }
        };
        Self::new(info.width, info.height, Arc::new(pixels))
    }

    /// Scale to fit inside `max_w` x `max_h` points, keeping aspect ratio.
    pub fn fit(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        let scale = (max_w / self.width as f32).min(max_h / self.height as f32);
        (self.width as f32 * scale, self.height as f32 * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::chart_renderer::encode_png;

    #[test]
    fn test_png_decodes_to_rgb() {
        let rgb = vec![10, 20, 30, 40, 50, 60];
        let png = encode_png(&rgb, 2, 1).unwrap();
        let image = RgbImage::from_png(&png).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(*image.pixels, rgb);
    }

    #[test]
    fn test_rejects_garbage_and_mismatched_buffers() {
        assert!(RgbImage::from_png(b"\x89PNG\r\n\x1a\nnot really").is_err());
        assert!(RgbImage::new(2, 2, Arc::new(vec![0; 5])).is_err());
    }

    #[test]
    fn test_fit_keeps_aspect_ratio() {
        let image = RgbImage::new(200, 100, Arc::new(vec![0; 200 * 100 * 3])).unwrap();
        assert_eq!(image.fit(100.0, 100.0), (100.0, 50.0));
        assert_eq!(image.fit(400.0, 50.0), (100.0, 50.0));
    }
}
