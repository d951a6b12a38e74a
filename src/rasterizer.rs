//! First-page rasterization.
//!
//! The pipeline only depends on the [`Rasterizer`] trait. The pdfium-backed
//! implementation is compiled with the `pdfium` feature; without it the
//! binary falls back to [`UnavailableRasterizer`] and every card shows the
//! placeholder.

use crate::error::RasterError;
use image::RgbImage;
use log::debug;
use std::path::Path;

/// Renders the first page of a document to an RGB bitmap.
///
/// Implementations are shared across worker threads. They may fail for
/// corrupt, encrypted or otherwise malformed files; callers check for
/// missing and zero-page documents before asking for a render.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, path: &Path) -> Result<usize, RasterError>;

    /// Renders page 0 at `zoom` times its natural size.
    fn rasterize_first_page(&self, path: &Path, zoom: f32) -> Result<RgbImage, RasterError>;
}

/// Rasterizer used when no PDF backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRasterizer;

impl Rasterizer for UnavailableRasterizer {
    fn page_count(&self, _path: &Path) -> Result<usize, RasterError> {
        Err(RasterError::Unavailable(
            "built without the `pdfium` feature".to_string(),
        ))
    }

    fn rasterize_first_page(&self, _path: &Path, _zoom: f32) -> Result<RgbImage, RasterError> {
        Err(RasterError::Unavailable(
            "built without the `pdfium` feature".to_string(),
        ))
    }
}

/// Render settings tried in order until one succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderAttempt {
    Color,
    Grayscale,
    GrayscaleWithoutAnnotations,
}

impl RenderAttempt {
    pub const ORDER: [RenderAttempt; 3] = [
        RenderAttempt::Color,
        RenderAttempt::Grayscale,
        RenderAttempt::GrayscaleWithoutAnnotations,
    ];

    pub fn grayscale(self) -> bool {
        self != RenderAttempt::Color
    }

    pub fn annotations(self) -> bool {
        self != RenderAttempt::GrayscaleWithoutAnnotations
    }
}

/// Runs `render` with each [`RenderAttempt`] until one succeeds.
///
/// Missing and zero-page documents are not retried. When every attempt
/// fails, the error of the last one is returned.
pub fn render_with_fallbacks<F>(path: &Path, mut render: F) -> Result<RgbImage, RasterError>
where
    F: FnMut(RenderAttempt) -> Result<RgbImage, RasterError>,
{
    let mut last_error = None;
    for attempt in RenderAttempt::ORDER {
        match render(attempt) {
            Ok(bitmap) => {
                if attempt != RenderAttempt::Color {
                    debug!("Rendered {} with {:?}", path.display(), attempt);
                }
                return Ok(bitmap);
            }
            Err(e @ (RasterError::Missing(_) | RasterError::NoPages(_))) => return Err(e),
            Err(e) => {
                debug!("{:?} render failed for {}: {}", attempt, path.display(), e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| RasterError::Render {
        path: path.to_path_buf(),
        message: "no render attempted".to_string(),
    }))
}

#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Rasterizer backed by the pdfium library.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        /// Binds pdfium from the executable directory, the working directory
        /// or the system library path, in that order.
        pub fn new() -> Result<Self, RasterError> {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));

            if let Some(ref dir) = exe_dir {
                if let Ok(bindings) =
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                {
                    return Ok(Self {
                        pdfium: Pdfium::new(bindings),
                    });
                }
            }

            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| RasterError::Unavailable(e.to_string()))?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }

        fn open<'a>(&'a self, path: &Path) -> Result<PdfDocument<'a>, RasterError> {
            self.pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| RasterError::Open {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
        }
    }

    impl Rasterizer for PdfiumRasterizer {
        fn page_count(&self, path: &Path) -> Result<usize, RasterError> {
            let document = self.open(path)?;
            Ok(document.pages().len() as usize)
        }

        fn rasterize_first_page(&self, path: &Path, zoom: f32) -> Result<RgbImage, RasterError> {
            let render_error = |message: String| RasterError::Render {
                path: path.to_path_buf(),
                message,
            };

            let document = self.open(path)?;
            if document.pages().len() == 0 {
                return Err(RasterError::NoPages(path.to_path_buf()));
            }

            let page = document
                .pages()
                .get(0)
                .map_err(|e| render_error(e.to_string()))?;

            render_with_fallbacks(path, |attempt| {
                let config = PdfRenderConfig::new()
                    .scale_page_by_factor(zoom)
                    .use_grayscale_rendering(attempt.grayscale())
                    .render_annotations(attempt.annotations());
                let bitmap = page
                    .render_with_config(&config)
                    .map_err(|e| render_error(e.to_string()))?;
                to_rgb(&bitmap).ok_or_else(|| {
                    render_error("bitmap size does not match its buffer".to_string())
                })
            })
        }
    }

    fn to_rgb(bitmap: &PdfBitmap) -> Option<RgbImage> {
        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = bitmap.as_rgba_bytes();

        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();

        RgbImage::from_raw(width, height, rgb)
    }
}
