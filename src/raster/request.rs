//! Raster request and response types

use std::sync::Arc;

use crate::analysis::PageIndex;

use super::types::RenderedPage;

/// Unique identifier for raster requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Generation counter identifying the document a request or response belongs
/// to. A continuation carrying a stale `DocumentId` must be discarded, never
/// applied to a newer document's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

/// Request sent to raster workers
#[derive(Debug)]
pub enum RasterRequest {
    /// Rasterize a page
    Page {
        id: RequestId,
        doc: DocumentId,
        page: PageIndex,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from the rasterization pipeline
#[derive(Debug, thiserror::Error)]
pub enum RasterFault {
    #[error("document too large: {bytes} bytes (limit {limit})")]
    TooLarge { bytes: usize, limit: usize },

    #[error("unsupported document format")]
    UnsupportedFormat,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("page {page} out of range (document has {count})")]
    PageOutOfRange { page: PageIndex, count: usize },

    #[error("page {page} decode timed out")]
    Timeout { page: PageIndex },

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::Error),
}

impl RasterFault {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Response from raster workers
#[derive(Debug)]
pub enum RasterResponse {
    /// Rasterized page data
    Page {
        id: RequestId,
        doc: DocumentId,
        page: PageIndex,
        data: Arc<RenderedPage>,
    },

    /// Error while rasterizing a page
    Error {
        id: RequestId,
        doc: DocumentId,
        page: PageIndex,
        error: RasterFault,
    },
}

impl RasterResponse {
    /// The document generation this response belongs to.
    #[must_use]
    pub fn document(&self) -> DocumentId {
        match self {
            Self::Page { doc, .. } | Self::Error { doc, .. } => *doc,
        }
    }

    /// The request that produced this response.
    #[must_use]
    pub fn request(&self) -> RequestId {
        match self {
            Self::Page { id, .. } | Self::Error { id, .. } => *id,
        }
    }
}
