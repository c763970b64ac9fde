//! Raster worker - runs in dedicated thread(s)
//!
//! Workers pull page requests off a shared queue, decode with the engine
//! matching the source kind, and publish results through the shared cache.
//! Every failure is reported as a response; a worker never panics the view.

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};

use crate::analysis::PageIndex;

use super::cache::PageCache;
use super::request::{RasterFault, RasterRequest, RasterResponse};
use super::source::{DocumentSource, MediaKind};
use super::types::RenderedPage;
#[cfg(feature = "pdf")]
use super::PDF_OVERSAMPLE;

/// Per-worker document handle. PDF documents are opened once per worker and
/// reused across page requests, like the underlying engine expects.
enum WorkerDoc {
    Raster,
    #[cfg(feature = "pdf")]
    Pdf(mupdf::Document),
}

/// Main worker function - runs in a dedicated thread
pub(crate) fn raster_worker(
    source: DocumentSource,
    requests: Receiver<RasterRequest>,
    responses: Sender<RasterResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    // Open failures (e.g. a malformed PDF) are remembered and reported per
    // request, so every page the view asks for fails in place instead of
    // hanging until the timeout.
    let handle = open_doc(&source).map_err(|e| e.to_string());

    for request in requests {
        match request {
            RasterRequest::Page { id, doc, page } => {
                let result = match &handle {
                    Ok(handle) => render_page(handle, &source, page),
                    Err(msg) => Err(RasterFault::decode(msg.clone())),
                };

                match result {
                    Ok(data) => {
                        let cached = cache
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .insert(data);
                        let _ = responses.send(RasterResponse::Page {
                            id,
                            doc,
                            page,
                            data: cached,
                        });
                    }
                    Err(error) => {
                        log::warn!("raster worker: page {page} failed: {error}");
                        let _ = responses.send(RasterResponse::Error {
                            id,
                            doc,
                            page,
                            error,
                        });
                    }
                }
            }

            RasterRequest::Shutdown => break,
        }
    }
}

fn open_doc(source: &DocumentSource) -> Result<WorkerDoc, RasterFault> {
    match source.kind() {
        MediaKind::Pdf => open_pdf(source),
        _ => Ok(WorkerDoc::Raster),
    }
}

#[cfg(feature = "pdf")]
fn open_pdf(source: &DocumentSource) -> Result<WorkerDoc, RasterFault> {
    let doc = mupdf::Document::from_bytes(source.bytes(), "application/pdf")?;
    Ok(WorkerDoc::Pdf(doc))
}

#[cfg(not(feature = "pdf"))]
fn open_pdf(_source: &DocumentSource) -> Result<WorkerDoc, RasterFault> {
    Err(RasterFault::UnsupportedFormat)
}

fn render_page(
    handle: &WorkerDoc,
    source: &DocumentSource,
    page: PageIndex,
) -> Result<RenderedPage, RasterFault> {
    match handle {
        WorkerDoc::Raster => decode_raster(source, page),
        #[cfg(feature = "pdf")]
        WorkerDoc::Pdf(doc) => render_pdf_page(doc, page),
    }
}

/// Identity rasterization: a raster source is its own single page.
fn decode_raster(source: &DocumentSource, page: PageIndex) -> Result<RenderedPage, RasterFault> {
    if page != PageIndex(1) {
        return Err(RasterFault::PageOutOfRange { page, count: 1 });
    }

    let decoded = image::load_from_memory(source.bytes())
        .map_err(|e| RasterFault::decode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width_px, height_px) = (rgb.width(), rgb.height());

    Ok(RenderedPage {
        index: page,
        pixels: rgb.into_raw(),
        width_px,
        height_px,
        scale: 1.0,
    })
}

/// Rasterize one PDF page at the fixed oversampling scale.
#[cfg(feature = "pdf")]
fn render_pdf_page(doc: &mupdf::Document, page: PageIndex) -> Result<RenderedPage, RasterFault> {
    use mupdf::{Colorspace, Matrix};

    let count = doc.page_count()? as usize;
    if page.0 == 0 || page.0 > count {
        return Err(RasterFault::PageOutOfRange { page, count });
    }

    let pdf_page = doc.load_page((page.0 - 1) as i32)?;
    let transform = Matrix::new_scale(PDF_OVERSAMPLE, PDF_OVERSAMPLE);
    let rgb = Colorspace::device_rgb();
    let pixmap = pdf_page.to_pixmap(&transform, &rgb, false, false)?;

    let pixels = pixmap_to_rgb(&pixmap)?;

    Ok(RenderedPage {
        index: page,
        pixels,
        width_px: pixmap.width(),
        height_px: pixmap.height(),
        scale: PDF_OVERSAMPLE,
    })
}

/// Repack pixmap samples (3 or 4 channels, arbitrary stride) as tight RGB.
#[cfg(feature = "pdf")]
fn pixmap_to_rgb(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, RasterFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RasterFault::decode(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(RasterFault::decode("pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
