//! Rasterization behind the [`Rasterizer`] trait.
//!
//! The precompiler only needs `render(document, scale) -> bitmap`. The
//! production implementation is [`SvgRasterizer`]: SVG through `resvg`, PNG
//! through `image`. Tests substitute a recording mock.
//!
//! Pixels are `0xAARRGGBB`, not premultiplied.

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse SVG {}: {source}", path.display())]
    Svg { path: PathBuf, source: usvg::Error },
    #[error("Failed to decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Cannot allocate a {width}x{height} canvas for {}", path.display())]
    Canvas {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("Unsupported image format: {}", .0.display())]
    Unsupported(PathBuf),
}

/// A rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Row-major ARGB, `width * height` entries.
    pub pixels: Vec<u32>,
}

impl Bitmap {
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// Renders a source document at a display scale.
///
/// `Sync` so one instance can serve rayon workers.
pub trait Rasterizer: Sync {
    fn render(&self, document: &Path, scale: f32) -> Result<Bitmap, RenderError>;
}

/// Pack non-premultiplied RGBA channels into ARGB.
pub fn argb(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Scaled pixel size, never below one.
pub fn scaled(size: f32, scale: f32) -> u32 {
    ((size * scale).round() as u32).max(1)
}

/// SVG via resvg, PNG via the image crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgRasterizer;

impl SvgRasterizer {
    pub fn new() -> Self {
        Self
    }

    fn render_svg(&self, path: &Path, data: &[u8], scale: f32) -> Result<Bitmap, RenderError> {
        let options = usvg::Options::default();
        let tree = usvg::Tree::from_data(data, &options).map_err(|source| RenderError::Svg {
            path: path.to_path_buf(),
            source,
        })?;
        let size = tree.size();
        let width = scaled(size.width(), scale);
        let height = scaled(size.height(), scale);
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| RenderError::Canvas {
            path: path.to_path_buf(),
            width,
            height,
        })?;
        let transform = Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        let pixels = pixmap
            .pixels()
            .iter()
            .map(|p| {
                let c = p.demultiply();
                argb(c.red(), c.green(), c.blue(), c.alpha())
            })
            .collect();
        Ok(Bitmap {
            width,
            height,
            pixels,
        })
    }

    fn render_raster(&self, path: &Path, data: &[u8], scale: f32) -> Result<Bitmap, RenderError> {
        let img = image::load_from_memory(data).map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let img = if (scale - 1.0).abs() > f32::EPSILON {
            let width = scaled(img.width() as f32, scale);
            let height = scaled(img.height() as f32, scale);
            img.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        } else {
            img
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| argb(p[0], p[1], p[2], p[3]))
            .collect();
        Ok(Bitmap {
            width,
            height,
            pixels,
        })
    }
}

impl Rasterizer for SvgRasterizer {
    fn render(&self, document: &Path, scale: f32) -> Result<Bitmap, RenderError> {
        let data = std::fs::read(document).map_err(|source| RenderError::Io {
            path: document.to_path_buf(),
            source,
        })?;
        match crate::variant::extension_of(document).as_deref() {
            Some("svg") => self.render_svg(document, &data, scale),
            Some("png") => self.render_raster(document, &data, scale),
            _ => Err(RenderError::Unsupported(document.to_path_buf())),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock rasterizer that records calls and returns blank bitmaps.
    /// Uses Mutex so it is Sync for rayon.
    #[derive(Default)]
    pub struct MockRasterizer {
        /// Base (1x) size per document; 16x16 when absent.
        pub sizes: HashMap<PathBuf, (u32, u32)>,
        pub calls: Mutex<Vec<(PathBuf, f32)>>,
    }

    impl MockRasterizer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_size(mut self, document: &Path, width: u32, height: u32) -> Self {
            self.sizes.insert(document.to_path_buf(), (width, height));
            self
        }

        pub fn get_calls(&self) -> Vec<(PathBuf, f32)> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            calls
        }
    }

    impl Rasterizer for MockRasterizer {
        fn render(&self, document: &Path, scale: f32) -> Result<Bitmap, RenderError> {
            self.calls
                .lock()
                .unwrap()
                .push((document.to_path_buf(), scale));
            let (w, h) = self.sizes.get(document).copied().unwrap_or((16, 16));
            let width = scaled(w as f32, scale);
            let height = scaled(h as f32, scale);
            Ok(Bitmap {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            })
        }
    }

    const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16">
  <rect width="16" height="16" fill="#ff0000"/>
</svg>"##;

    #[test]
    fn argb_packing() {
        assert_eq!(argb(0x11, 0x22, 0x33, 0x44), 0x4411_2233);
    }

    #[test]
    fn scaled_rounds_and_clamps() {
        assert_eq!(scaled(16.0, 1.25), 20);
        assert_eq!(scaled(16.0, 1.5), 24);
        assert_eq!(scaled(0.2, 1.0), 1);
    }

    #[test]
    fn svg_renders_at_scale() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("red.svg");
        std::fs::write(&path, RED_SQUARE).unwrap();

        let bitmap = SvgRasterizer::new().render(&path, 1.5).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (24, 24));
        assert_eq!(bitmap.pixels.len(), 24 * 24);
        assert_eq!(bitmap.pixels[12 * 24 + 12], 0xFFFF_0000);
    }

    #[test]
    fn png_is_resized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blue.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();

        let bitmap = SvgRasterizer::new().render(&path, 2.0).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (16, 16));
        let pixel = bitmap.pixels[0];
        assert_eq!(pixel >> 24, 0xFF);
        assert!(pixel & 0xFF >= 0xF0, "{pixel:#010x}");
    }

    #[test]
    fn broken_svg_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.svg");
        std::fs::write(&path, "<svg").unwrap();
        assert!(matches!(
            SvgRasterizer::new().render(&path, 1.0),
            Err(RenderError::Svg { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            SvgRasterizer::new().render(Path::new("/nonexistent/a.svg"), 1.0),
            Err(RenderError::Io { .. })
        ));
    }
}
