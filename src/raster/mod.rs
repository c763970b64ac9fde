//! Page rasterization infrastructure
//!
//! Turns an uploaded document (raster image or multi-page PDF) into one
//! addressable RGB raster per page, off the interactive thread, with an LRU
//! cache and a per-page state machine the view can poll.

mod cache;
mod request;
mod service;
mod source;
mod state;
mod types;
mod worker;

pub use cache::PageCache;
pub use request::{DocumentId, RasterFault, RasterRequest, RasterResponse, RequestId};
pub use service::{RasterConfig, RasterService};
pub use source::{DocumentSource, MediaKind, MAX_DOCUMENT_BYTES};
pub use state::PageState;
pub use types::RenderedPage;

use std::time::Duration;

/// Default number of rasterization worker threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Default page cache capacity.
pub const DEFAULT_CACHE_SIZE: usize = 8;

/// Default per-page decode deadline.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Oversampling factor for PDF pages, so text stays legible when zoomed.
pub const PDF_OVERSAMPLE: f32 = 2.0;
