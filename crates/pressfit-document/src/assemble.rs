// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output document assembly for the rasterising strategy.
//
// The builder owns the single shared output accumulator. Page bytes are
// produced in parallel elsewhere; commits happen here, one at a time and
// strictly in reading order, so the output never depends on completion
// order.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pressfit_core::error::{PressfitError, Result};
use tracing::warn;

/// Builds a new PDF whose pages are each a single full-page JPEG.
///
/// Pages must be pushed in reading order; the builder performs no
/// reordering of its own.
pub struct RasterDocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl RasterDocumentBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        // Reserve the page-tree id up front so page dictionaries can point
        // at their parent before the tree itself is written.
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Append one page consisting solely of the given JPEG, with the page
    /// box sized to the image at 72 DPI (one pixel per point).
    pub fn push_jpeg_page(&mut self, jpeg: Vec<u8>, width: u32, height: u32) {
        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        image_dict.set("Width", Object::Integer(width as i64));
        image_dict.set("Height", Object::Integer(height as i64));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        let image_id = self.doc.add_object(Object::Stream(Stream::new(image_dict, jpeg)));

        // Scale the unit-square image to fill the media box.
        let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ");
        let content_id = self
            .doc
            .add_object(Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width as i64),
                Object::Integer(height as i64),
            ]),
        );
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Reference(content_id));

        let page_id = self.doc.add_object(Object::Dictionary(page));
        self.kids.push(Object::Reference(page_id));
    }

    /// Append a page deep-cloned from `source` unchanged.
    ///
    /// Used when a page could not be rendered: the original content (and
    /// everything it references) is carried over so the output keeps its
    /// page count.
    pub fn push_cloned_page(&mut self, source: &Document, page_id: ObjectId) -> Result<()> {
        let page_object = source.get_object(page_id).map_err(|err| {
            PressfitError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        let cloned = deep_clone_object(source, &mut self.doc, page_object)?;
        let cloned_id = self.doc.add_object(cloned);

        if let Ok(Object::Dictionary(dict)) = self.doc.get_object_mut(cloned_id) {
            dict.set("Parent", Object::Reference(self.pages_id));
        }
        self.kids.push(Object::Reference(cloned_id));
        Ok(())
    }

    /// Number of pages committed so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree and catalog, compress streams, and serialise.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.kids.len() as i64));
        pages.set("Kids", Object::Array(self.kids));
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(Object::Dictionary(catalog));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();

        let mut output = Vec::new();
        self.doc.save_to(&mut output).map_err(|err| {
            PressfitError::PdfError(format!("failed to serialise output document: {}", err))
        })?;
        Ok(output)
    }
}

impl Default for RasterDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-clone a single lopdf object from `source` into `target`,
/// recursively resolving references.
///
/// /Parent entries are skipped to avoid circular cloning; the caller
/// re-points the cloned page at the target's page tree.
fn deep_clone_object(source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(entries) => {
            let mut new_entries = Vec::with_capacity(entries.len());
            for entry in entries {
                new_entries.push(deep_clone_object(source, target, entry)?);
            }
            Ok(Object::Array(new_entries))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = deep_clone_object(source, target, referenced)?;
                let new_id = target.add_object(cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                warn!(?ref_id, %err, "cannot resolve reference while cloning page, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = deep_clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Stream(Stream::new(new_dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}
