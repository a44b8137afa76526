// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared test fixtures: synthetic source documents and stub renderers.

use lopdf::{Dictionary, Document, Object, Stream};

use crate::render::{PageRenderer, RenderedPage};
use pressfit_core::error::{PressfitError, Result};

/// Serialise a simple document with `count` text/vector pages.
pub(crate) fn document_with_pages(count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(count);
    for index in 0..count {
        let content = format!(
            "BT /F1 24 Tf 72 700 Td (Page {}) Tj ET\n0 0 m 100 {} l S",
            index + 1,
            (index + 1) * 50
        );
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.into_bytes(),
        )));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        let page_id = doc.add_object(Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(count as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialise test document");
    bytes
}

/// Serialise a one-page document embedding a `width` x `height` raw RGB
/// image filled with deterministic noise.
///
/// Noise resists Flate compression, so the serialised document stays
/// roughly `width * height * 3` bytes — big enough to force the
/// text-preserving search in tests.
pub(crate) fn document_with_noise_image(width: u32, height: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(width as i64));
    image_dict.set("Height", Object::Integer(height as i64));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    let image_id = doc.add_object(Object::Stream(Stream::new(
        image_dict,
        noise_bytes(width as usize * height as usize * 3),
    )));

    let content = format!("q\n{width} 0 0 {height} 100 100 cm\n/Im0 Do\nQ\nBT /F1 12 Tf 72 60 Td (Exhibit) Tj ET");
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        content.into_bytes(),
    )));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(Object::Dictionary(page));

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(1));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialise test document");
    bytes
}

/// Deterministic pseudo-random bytes (no RNG dependency in tests).
fn noise_bytes(len: usize) -> Vec<u8> {
    let mut state = 0x2545F4914F6CDD1Du64;
    let mut bytes = Vec::with_capacity(len);
    while bytes.len() < len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        bytes.extend_from_slice(&state.to_le_bytes());
    }
    bytes.truncate(len);
    bytes
}

/// Stub renderer producing a deterministic gradient page of fixed size.
pub(crate) struct GradientRenderer {
    pub width: u32,
    pub height: u32,
}

impl PageRenderer for GradientRenderer {
    fn render_page(&self, _pdf_bytes: &[u8], page_index: usize) -> Result<RenderedPage> {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                rgb.push((x % 256) as u8);
                rgb.push((y % 256) as u8);
                rgb.push((page_index * 40 % 256) as u8);
            }
        }
        RenderedPage::from_rgb(self.width, self.height, &rgb)
    }
}

/// Renderer that fails on one chosen page and delegates otherwise.
pub(crate) struct FailingRenderer {
    pub fail_index: usize,
    pub inner: GradientRenderer,
}

impl PageRenderer for FailingRenderer {
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize) -> Result<RenderedPage> {
        if page_index == self.fail_index {
            return Err(PressfitError::RenderError(format!(
                "synthetic failure on page {}",
                page_index + 1
            )));
        }
        self.inner.render_page(pdf_bytes, page_index)
    }
}
