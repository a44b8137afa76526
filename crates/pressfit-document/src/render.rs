// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterisation seam and JPEG encoding primitive.
//
// The engine never renders PDF content itself — it consumes a
// `PageRenderer` implementation. Builds with the `pdfium` feature get a
// PDFium-backed renderer; builds without one can still run the
// text-preserving strategy, and the raster strategy reports
// `RendererUnavailable`.

use image::RgbImage;
use pressfit_core::error::{PressfitError, Result};

/// A page rendered to a pixel buffer at native (1:1) scale.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA samples, row-major.
    pub rgba: Vec<u8>,
}

impl RenderedPage {
    /// Wrap an RGBA buffer. Fails when the buffer does not match the
    /// stated dimensions.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(PressfitError::RenderError(format!(
                "RGBA buffer is {} bytes, expected {} for {}x{}",
                rgba.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Normalise an RGB buffer into RGBA with fully opaque alpha.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(PressfitError::RenderError(format!(
                "RGB buffer is {} bytes, expected {} for {}x{}",
                rgb.len(),
                expected,
                width,
                height
            )));
        }
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for pixel in rgb.chunks_exact(3) {
            rgba.extend_from_slice(pixel);
            rgba.push(0xFF);
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Flatten to RGB for JPEG encoding (alpha is discarded).
    pub fn into_rgb(self) -> Result<RgbImage> {
        let Self {
            width,
            height,
            rgba,
        } = self;
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in rgba.chunks_exact(4) {
            rgb.extend_from_slice(&pixel[..3]);
        }
        RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            PressfitError::RenderError(format!(
                "pixel buffer does not match {}x{} page",
                width, height
            ))
        })
    }
}

/// Renders single pages of a PDF to pixel buffers.
///
/// Implementations must be callable from multiple worker threads at once.
/// Each call opens its own view of `pdf_bytes` — a document handle is
/// never shared across workers, because the underlying rendering library
/// may not be safe for concurrent use on one handle.
pub trait PageRenderer: Send + Sync {
    /// Render the zero-indexed page of `pdf_bytes` at 1:1 scale (72 DPI).
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize) -> Result<RenderedPage>;
}

/// Encode an RGB image as JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|err| PressfitError::ImageError(format!("JPEG encoding failed: {err}")))?;
    Ok(buffer)
}

/// PDFium-backed page renderer.
///
/// Binds the system PDFium library and opens a fresh document per call,
/// keeping render state isolated per worker.
#[cfg(feature = "pdfium")]
pub struct PdfiumRenderer;

#[cfg(feature = "pdfium")]
impl PageRenderer for PdfiumRenderer {
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize) -> Result<RenderedPage> {
        use pdfium_render::prelude::*;

        let pdfium = Pdfium::new(Pdfium::bind_to_system_library().map_err(|err| {
            PressfitError::RenderError(format!("cannot bind PDFium: {err}"))
        })?);
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|err| PressfitError::RenderError(format!("cannot open PDF: {err}")))?;
        let pages = document.pages();
        let page = pages.get(page_index as u16).map_err(|err| {
            PressfitError::RenderError(format!("page {} unavailable: {err}", page_index + 1))
        })?;
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(1.0))
            .map_err(|err| {
                PressfitError::RenderError(format!(
                    "rendering page {} failed: {err}",
                    page_index + 1
                ))
            })?;
        let rgba = bitmap.as_image().to_rgba8();
        RenderedPage::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
    }
}
