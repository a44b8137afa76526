// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image-stream catalog — enumerates and classifies the raster image
// XObjects of a parsed document, and performs the per-stream decode,
// rewrite, and strip operations the text-preserving strategy needs.

use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pressfit_core::error::{PressfitError, Result};
use tracing::debug;

/// One embeddable raster image stream inside a document.
///
/// Carries the raw (still filtered) payload behind an `Arc` so trials can
/// hand streams to worker threads without copying megabytes per clone.
#[derive(Debug, Clone)]
pub struct ImageStream {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    pub color_space: String,
    pub filter: Option<String>,
    stream: Arc<Stream>,
}

impl ImageStream {
    /// Size of the raw payload in bytes.
    pub fn payload_len(&self) -> usize {
        self.stream.content.len()
    }

    /// Decode the stream's pixels.
    ///
    /// JPEG and JPEG2000 payloads are decoded directly; other filters are
    /// undone through lopdf first, then the raw samples are interpreted
    /// according to the stream's colour space.
    pub fn decode(&self) -> Result<DynamicImage> {
        match self.filter.as_deref() {
            Some("DCTDecode") | Some("JPXDecode") => {
                image::load_from_memory(&self.stream.content).map_err(|err| {
                    PressfitError::ImageError(format!(
                        "cannot decode {:?} payload of object {:?}: {err}",
                        self.filter, self.id
                    ))
                })
            }
            Some(_) => {
                let raw = self.stream.decompressed_content().map_err(|err| {
                    PressfitError::ImageError(format!(
                        "cannot unfilter object {:?}: {err}",
                        self.id
                    ))
                })?;
                self.raw_to_image(raw)
            }
            None => self.raw_to_image(self.stream.content.clone()),
        }
    }

    /// Interpret unfiltered samples according to colour space and depth.
    fn raw_to_image(&self, raw: Vec<u8>) -> Result<DynamicImage> {
        if self.bits_per_component != 8 {
            return Err(PressfitError::ImageError(format!(
                "unsupported bit depth {} for object {:?}",
                self.bits_per_component, self.id
            )));
        }

        let pixels = self.width as usize * self.height as usize;
        match self.color_space.as_str() {
            "DeviceRGB" | "CalRGB" | "RGB" => self.rgb_from_raw(raw, pixels * 3),
            "DeviceGray" | "CalGray" | "Gray" => {
                if raw.len() < pixels {
                    return Err(self.size_mismatch(raw.len(), pixels));
                }
                let gray = GrayImage::from_raw(self.width, self.height, raw[..pixels].to_vec())
                    .ok_or_else(|| self.size_mismatch(pixels, pixels))?;
                Ok(DynamicImage::ImageLuma8(gray))
            }
            "DeviceCMYK" | "CMYK" => {
                let expected = pixels * 4;
                if raw.len() < expected {
                    return Err(self.size_mismatch(raw.len(), expected));
                }
                let mut rgb = Vec::with_capacity(pixels * 3);
                for chunk in raw[..expected].chunks_exact(4) {
                    let c = chunk[0] as f32 / 255.0;
                    let m = chunk[1] as f32 / 255.0;
                    let y = chunk[2] as f32 / 255.0;
                    let k = chunk[3] as f32 / 255.0;
                    rgb.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
                    rgb.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
                    rgb.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
                }
                let image = RgbImage::from_raw(self.width, self.height, rgb)
                    .ok_or_else(|| self.size_mismatch(expected, expected))?;
                Ok(DynamicImage::ImageRgb8(image))
            }
            // ICC profiles: guess the component count from the payload size.
            "ICCBased" => {
                if raw.len() >= pixels * 3 {
                    self.rgb_from_raw(raw, pixels * 3)
                } else if raw.len() >= pixels {
                    let gray =
                        GrayImage::from_raw(self.width, self.height, raw[..pixels].to_vec())
                            .ok_or_else(|| self.size_mismatch(pixels, pixels))?;
                    Ok(DynamicImage::ImageLuma8(gray))
                } else {
                    Err(self.size_mismatch(raw.len(), pixels))
                }
            }
            other => Err(PressfitError::ImageError(format!(
                "unsupported colour space {} for object {:?}",
                other, self.id
            ))),
        }
    }

    fn rgb_from_raw(&self, raw: Vec<u8>, expected: usize) -> Result<DynamicImage> {
        if raw.len() < expected {
            return Err(self.size_mismatch(raw.len(), expected));
        }
        let image = RgbImage::from_raw(self.width, self.height, raw[..expected].to_vec())
            .ok_or_else(|| self.size_mismatch(expected, expected))?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    fn size_mismatch(&self, got: usize, expected: usize) -> PressfitError {
        PressfitError::ImageError(format!(
            "object {:?}: {got} bytes of sample data, expected {expected}",
            self.id
        ))
    }
}

/// Enumerate the raster image XObjects eligible for recompression.
///
/// 1-bit streams (masks and bilevel art) are never targets: re-encoding
/// them as JPEG would balloon their size and destroy mask semantics.
pub fn catalog_image_streams(doc: &Document) -> Vec<ImageStream> {
    let mut streams = Vec::new();

    for (id, object) in doc.objects.iter() {
        let stream = match object {
            Object::Stream(stream) if is_image_stream(stream) => stream,
            _ => continue,
        };
        let bits = bits_per_component(stream);
        if bits == 1 {
            continue;
        }

        streams.push(ImageStream {
            id: *id,
            width: dict_u32(&stream.dict, b"Width"),
            height: dict_u32(&stream.dict, b"Height"),
            bits_per_component: bits,
            color_space: color_space_name(doc, &stream.dict),
            filter: first_filter_name(&stream.dict),
            stream: Arc::new(stream.clone()),
        });
    }

    debug!(count = streams.len(), "catalogued image streams");
    streams
}

/// Replace an image stream with a freshly JPEG-encoded payload.
///
/// The dictionary is rebuilt from scratch: XObject/Image subtype, DCT
/// filter, the re-encoded dimensions, 8 bits per component, DeviceRGB.
pub fn apply_recompressed(
    doc: &mut Document,
    id: ObjectId,
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
) {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));

    doc.objects.insert(id, Object::Stream(Stream::new(dict, jpeg)));
}

/// Zero the payload of every image stream, keeping dictionaries intact.
///
/// This produces the text-only floor: the smallest document reachable
/// without touching text or vector content. All image streams are hit,
/// including 1-bit ones.
pub fn strip_image_payloads(doc: &mut Document) {
    let targets: Vec<(ObjectId, Dictionary)> = doc
        .objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) if is_image_stream(stream) => {
                Some((*id, stream.dict.clone()))
            }
            _ => None,
        })
        .collect();

    for (id, dict) in targets {
        doc.objects
            .insert(id, Object::Stream(Stream::new(dict, Vec::new())));
    }
}

// -- Dictionary helpers -------------------------------------------------------

fn is_image_stream(stream: &Stream) -> bool {
    matches!(
        stream.dict.get(b"Subtype"),
        Ok(Object::Name(name)) if name == b"Image"
    )
}

/// Bits per component, defaulting to 8 when absent (the common case for
/// JPEG-filtered streams, which omit the entry).
fn bits_per_component(stream: &Stream) -> u32 {
    stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|obj| obj.as_i64().ok())
        .map(|bits| bits as u32)
        .unwrap_or(8)
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> u32 {
    dict.get(key)
        .ok()
        .and_then(|obj| obj.as_i64().ok())
        .map(|value| value as u32)
        .unwrap_or(0)
}

fn first_filter_name(dict: &Dictionary) -> Option<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(String::from_utf8_lossy(name).to_string()),
        Ok(Object::Array(filters)) => filters.first().and_then(|f| match f {
            Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// Resolve a colour-space entry to its family name, following references
/// and `[/ICCBased ...]`-style arrays.
fn color_space_name(doc: &Document, dict: &Dictionary) -> String {
    fn resolve(doc: &Document, object: &Object) -> String {
        match object {
            Object::Name(name) => String::from_utf8_lossy(name).to_string(),
            Object::Array(entries) => match entries.first() {
                Some(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
                _ => "Unknown".to_string(),
            },
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(inner) => resolve(doc, inner),
                Err(_) => "Unknown".to_string(),
            },
            _ => "Unknown".to_string(),
        }
    }

    match dict.get(b"ColorSpace") {
        Ok(object) => resolve(doc, object),
        Err(_) => "DeviceRGB".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_dict(width: u32, height: u32, bits: i64, color_space: &[u8]) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(width as i64));
        dict.set("Height", Object::Integer(height as i64));
        dict.set("BitsPerComponent", Object::Integer(bits));
        dict.set("ColorSpace", Object::Name(color_space.to_vec()));
        dict
    }

    /// Document with one raw RGB image, one 1-bit mask, and one non-image
    /// stream.
    fn sample_doc() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.5");

        let rgb_pixels = vec![200u8; 4 * 4 * 3];
        let rgb_id = doc.add_object(Object::Stream(Stream::new(
            image_dict(4, 4, 8, b"DeviceRGB"),
            rgb_pixels,
        )));

        let mask_id = doc.add_object(Object::Stream(Stream::new(
            image_dict(4, 4, 1, b"DeviceGray"),
            vec![0xFFu8; 2],
        )));

        doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"BT /F1 12 Tf ET".to_vec(),
        )));

        (doc, rgb_id, mask_id)
    }

    #[test]
    fn catalog_excludes_one_bit_streams() {
        let (doc, rgb_id, mask_id) = sample_doc();
        let streams = catalog_image_streams(&doc);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].id, rgb_id);
        assert!(streams.iter().all(|s| s.id != mask_id));
    }

    #[test]
    fn catalog_captures_stream_metadata() {
        let (doc, _, _) = sample_doc();
        let stream = &catalog_image_streams(&doc)[0];
        assert_eq!((stream.width, stream.height), (4, 4));
        assert_eq!(stream.bits_per_component, 8);
        assert_eq!(stream.color_space, "DeviceRGB");
        assert!(stream.filter.is_none());
        assert_eq!(stream.payload_len(), 4 * 4 * 3);
    }

    #[test]
    fn decode_raw_rgb_stream() {
        let (doc, _, _) = sample_doc();
        let stream = &catalog_image_streams(&doc)[0];
        let image = stream.decode().unwrap();
        assert_eq!((image.width(), image.height()), (4, 4));
    }

    #[test]
    fn decode_jpeg_stream() {
        let mut doc = Document::with_version("1.5");
        let rgb = RgbImage::from_pixel(8, 8, image::Rgb([90, 120, 30]));
        let jpeg = crate::render::encode_jpeg(&rgb, 80).unwrap();

        let mut dict = image_dict(8, 8, 8, b"DeviceRGB");
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        doc.add_object(Object::Stream(Stream::new(dict, jpeg)));

        let streams = catalog_image_streams(&doc);
        assert_eq!(streams[0].filter.as_deref(), Some("DCTDecode"));
        let image = streams[0].decode().unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));
    }

    #[test]
    fn strip_zeroes_all_image_payloads_but_keeps_dictionaries() {
        let (mut doc, rgb_id, mask_id) = sample_doc();
        strip_image_payloads(&mut doc);

        for id in [rgb_id, mask_id] {
            match doc.get_object(id).unwrap() {
                Object::Stream(stream) => {
                    assert!(stream.content.is_empty());
                    assert!(is_image_stream(stream));
                }
                other => panic!("expected stream, got {:?}", other),
            }
        }
    }

    #[test]
    fn apply_recompressed_rewrites_dictionary_and_payload() {
        let (mut doc, rgb_id, _) = sample_doc();
        let jpeg = vec![0xFFu8, 0xD8, 0xFF, 0xD9];
        apply_recompressed(&mut doc, rgb_id, jpeg.clone(), 2, 3);

        match doc.get_object(rgb_id).unwrap() {
            Object::Stream(stream) => {
                assert_eq!(stream.content, jpeg);
                assert_eq!(first_filter_name(&stream.dict).as_deref(), Some("DCTDecode"));
                assert_eq!(dict_u32(&stream.dict, b"Width"), 2);
                assert_eq!(dict_u32(&stream.dict, b"Height"), 3);
                assert_eq!(bits_per_component(stream), 8);
            }
            other => panic!("expected stream, got {:?}", other),
        }
    }
}
