//! Document source: opaque bytes plus a media kind
//!
//! The core accepts the uploaded document as a byte blob with a declared
//! media type. The declared type is trusted when recognized; otherwise the
//! kind is sniffed from magic bytes. Unrecognized content is rejected up
//! front so the rasterizer only ever sees decodable kinds.

use std::sync::Arc;

use super::request::RasterFault;

/// Upload size limit, matching the product's 5MB restriction.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Supported media kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Png,
    Jpeg,
    Gif,
    WebP,
    Pdf,
}

impl MediaKind {
    /// Map a declared MIME type to a kind, if recognized.
    #[must_use]
    pub fn from_declared(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Detect a kind from leading magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    /// Whether this kind carries multiple addressable pages.
    #[must_use]
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// An uploaded document: shared bytes plus the resolved media kind.
#[derive(Clone, Debug)]
pub struct DocumentSource {
    bytes: Arc<Vec<u8>>,
    kind: MediaKind,
}

impl DocumentSource {
    /// Validate and wrap uploaded bytes. The declared MIME type wins when it
    /// is recognized; magic-byte sniffing is the fallback. Oversized or
    /// unrecognizable uploads are rejected here, recoverably.
    pub fn new(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<Self, RasterFault> {
        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(RasterFault::TooLarge {
                bytes: bytes.len(),
                limit: MAX_DOCUMENT_BYTES,
            });
        }

        let kind = declared_mime
            .and_then(MediaKind::from_declared)
            .or_else(|| MediaKind::sniff(&bytes))
            .ok_or(RasterFault::UnsupportedFormat)?;

        Ok(Self {
            bytes: Arc::new(bytes),
            kind,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Pixel dimensions of a raster source, read from the header without a
    /// full decode. `None` for paginated sources or corrupt headers.
    #[must_use]
    pub fn probe_dimensions(&self) -> Option<(u32, u32)> {
        if self.kind.is_paginated() {
            return None;
        }
        imagesize::blob_size(&self.bytes)
            .ok()
            .map(|size| (size.width as u32, size.height as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn declared_mime_wins() {
        let src = DocumentSource::new(b"%PDF-1.4 ...".to_vec(), Some("application/pdf")).unwrap();
        assert_eq!(src.kind(), MediaKind::Pdf);
    }

    #[test]
    fn sniffs_when_mime_is_unknown() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let src = DocumentSource::new(bytes, Some("application/octet-stream")).unwrap();
        assert_eq!(src.kind(), MediaKind::Png);

        let src = DocumentSource::new(b"%PDF-1.7".to_vec(), None).unwrap();
        assert_eq!(src.kind(), MediaKind::Pdf);
    }

    #[test]
    fn probes_raster_dimensions_from_the_header() {
        let mut bytes = Vec::new();
        let img = image::RgbImage::from_pixel(24, 16, image::Rgb([0, 0, 0]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();

        let src = DocumentSource::new(bytes, None).unwrap();
        assert_eq!(src.probe_dimensions(), Some((24, 16)));

        let pdf = DocumentSource::new(b"%PDF-1.4".to_vec(), None).unwrap();
        assert_eq!(pdf.probe_dimensions(), None);
    }

    #[test]
    fn rejects_unrecognized_bytes() {
        let err = DocumentSource::new(b"plain text, not a document".to_vec(), None).unwrap_err();
        assert!(matches!(err, RasterFault::UnsupportedFormat));
    }

    #[test]
    fn rejects_oversized_uploads() {
        let bytes = vec![0u8; MAX_DOCUMENT_BYTES + 1];
        let err = DocumentSource::new(bytes, Some("image/png")).unwrap_err();
        assert!(matches!(err, RasterFault::TooLarge { .. }));
    }
}
