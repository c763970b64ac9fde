//! Raster service - manages worker pool, cache and page states

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};

use crate::analysis::PageIndex;

use super::cache::PageCache;
use super::request::{DocumentId, RasterFault, RasterRequest, RasterResponse, RequestId};
use super::source::{DocumentSource, MediaKind};
use super::state::{PageState, PageTracker};
use super::types::RenderedPage;
use super::worker::raster_worker;
use super::{DEFAULT_CACHE_SIZE, DEFAULT_DECODE_TIMEOUT, DEFAULT_WORKERS};

/// Tuning knobs for the rasterization service.
#[derive(Clone, Debug)]
pub struct RasterConfig {
    /// Worker thread count
    pub workers: usize,
    /// Page cache capacity
    pub cache_capacity: usize,
    /// Per-page decode deadline
    pub decode_timeout: Duration,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cache_capacity: DEFAULT_CACHE_SIZE,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct Pending {
    page: PageIndex,
    issued: Instant,
}

/// Manages page rasterization with worker threads and caching.
///
/// One service per document: opening a new document means opening a new
/// service, so cached pages can never leak across documents. Responses
/// carry the service's [`DocumentId`] and anything stale is dropped in
/// [`poll`](Self::poll).
pub struct RasterService {
    doc: DocumentId,
    kind: MediaKind,
    tracker: PageTracker,
    request_tx: Sender<RasterRequest>,
    response_rx: Receiver<RasterResponse>,
    next_request_id: u64,
    pending: HashMap<RequestId, Pending>,
    cache: Arc<Mutex<PageCache>>,
    decode_timeout: Duration,
    num_workers: usize,
}

impl RasterService {
    /// Open a document and spawn the worker pool. Page 1 is requested
    /// eagerly; other pages rasterize on demand. A malformed paginated
    /// document still opens - its pages then fail in place when requested.
    pub fn open(
        doc: DocumentId,
        source: DocumentSource,
        config: &RasterConfig,
    ) -> Result<Self, RasterFault> {
        let page_count = probe_page_count(&source)?;
        if let Some((w, h)) = source.probe_dimensions() {
            log::debug!("raster: opening {:?} source, {w}x{h}px", source.kind());
        } else {
            log::debug!(
                "raster: opening {:?} source, {page_count} page(s)",
                source.kind()
            );
        }
        let cache = Arc::new(Mutex::new(PageCache::new(config.cache_capacity)));

        // flume for MPMC: multiple workers pull from one shared request
        // queue, which std/tokio mpsc receivers cannot do.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = config.workers.max(1);
        for _ in 0..num_workers {
            let worker_source = source.clone();
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache_clone = cache.clone();

            std::thread::spawn(move || {
                raster_worker(worker_source, rx, tx, cache_clone);
            });
        }

        let mut service = Self {
            doc,
            kind: source.kind(),
            tracker: PageTracker::new(page_count),
            request_tx,
            response_rx,
            next_request_id: 1,
            pending: HashMap::new(),
            cache,
            decode_timeout: config.decode_timeout,
            num_workers,
        };

        service.request_page(PageIndex(1));

        Ok(service)
    }

    /// The document generation this service renders.
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.doc
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.tracker.page_count()
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Rendering state of a page.
    #[must_use]
    pub fn page_state(&self, page: PageIndex) -> &PageState {
        self.tracker.state(page)
    }

    /// The rendered raster for a page, if it is ready.
    #[must_use]
    pub fn ready_page(&self, page: PageIndex) -> Option<Arc<RenderedPage>> {
        self.tracker.state(page).ready().cloned()
    }

    /// Ask for a page to be rasterized. Returns the request id when work was
    /// actually dispatched; cache hits resolve immediately and duplicate
    /// requests for an in-flight page are skipped.
    pub fn request_page(&mut self, page: PageIndex) -> Option<RequestId> {
        if page.0 == 0 || page.0 > self.tracker.page_count() {
            log::warn!(
                "raster: page {page} out of range (document has {})",
                self.tracker.page_count()
            );
            return None;
        }

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(page);
        if let Some(data) = cached {
            self.tracker.complete(page, data);
            return None;
        }

        if !self.tracker.begin(page) {
            return None;
        }

        let id = self.next_id();
        let _ = self.request_tx.send(RasterRequest::Page {
            id,
            doc: self.doc,
            page,
        });
        self.pending.insert(
            id,
            Pending {
                page,
                issued: Instant::now(),
            },
        );

        Some(id)
    }

    /// Drain worker responses and apply them, then expire stalled requests.
    /// Returns the number of page-state changes. Responses for a different
    /// document generation, or for requests already expired by the timeout,
    /// are discarded without touching any state.
    pub fn poll(&mut self) -> usize {
        let mut changed = 0;

        while let Ok(response) = self.response_rx.try_recv() {
            if response.document() != self.doc {
                log::trace!("raster: dropping response for stale document");
                continue;
            }

            if self.pending.remove(&response.request()).is_none() {
                log::trace!("raster: dropping late response {:?}", response.request());
                continue;
            }

            match response {
                RasterResponse::Page { page, data, .. } => {
                    self.tracker.complete(page, data);
                    changed += 1;
                }
                RasterResponse::Error { page, error, .. } => {
                    self.tracker.fail(page, error.to_string());
                    changed += 1;
                }
            }
        }

        changed + self.expire_stalled()
    }

    fn expire_stalled(&mut self) -> usize {
        let now = Instant::now();
        let stalled: Vec<(RequestId, PageIndex)> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.duration_since(pending.issued) > self.decode_timeout)
            .map(|(id, pending)| (*id, pending.page))
            .collect();

        for (id, page) in &stalled {
            self.pending.remove(id);
            self.tracker
                .fail(*page, RasterFault::Timeout { page: *page }.to_string());
            log::warn!("raster: page {page} timed out after {:?}", self.decode_timeout);
        }

        stalled.len()
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RasterRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RasterService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn probe_page_count(source: &DocumentSource) -> Result<usize, RasterFault> {
    match source.kind() {
        MediaKind::Pdf => probe_pdf_page_count(source),
        _ => Ok(1),
    }
}

#[cfg(feature = "pdf")]
fn probe_pdf_page_count(source: &DocumentSource) -> Result<usize, RasterFault> {
    // A malformed PDF still opens the view with a single failing page; the
    // worker reports the actual decode error in place.
    let count = mupdf::Document::from_bytes(source.bytes(), "application/pdf")
        .and_then(|doc| doc.page_count())
        .unwrap_or(1);
    Ok((count.max(1)) as usize)
}

#[cfg(not(feature = "pdf"))]
fn probe_pdf_page_count(_source: &DocumentSource) -> Result<usize, RasterFault> {
    Err(RasterFault::UnsupportedFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_source() -> DocumentSource {
        let mut bytes = Vec::new();
        let img = image::RgbImage::from_pixel(8, 6, image::Rgb([255, 255, 255]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        DocumentSource::new(bytes, Some("image/png")).unwrap()
    }

    fn wait_for_page(service: &mut RasterService, page: PageIndex) -> PageState {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            service.poll();
            match service.page_state(page) {
                PageState::Ready(_) | PageState::Failed(_) => {
                    return service.page_state(page).clone();
                }
                _ if Instant::now() > deadline => {
                    panic!("page {page} never resolved");
                }
                _ => std::thread::sleep(Duration::from_millis(5)),
            }
        }
    }

    #[test]
    fn image_source_renders_page_one_eagerly() {
        let mut service =
            RasterService::open(DocumentId(1), png_source(), &RasterConfig::default()).unwrap();

        assert_eq!(service.page_count(), 1);
        let state = wait_for_page(&mut service, PageIndex(1));
        let page = state.ready().expect("page 1 should rasterize");
        assert_eq!(page.width_px, 8);
        assert_eq!(page.height_px, 6);
    }

    #[test]
    fn out_of_range_request_is_rejected() {
        let mut service =
            RasterService::open(DocumentId(1), png_source(), &RasterConfig::default()).unwrap();

        assert!(service.request_page(PageIndex(4)).is_none());
        assert!(matches!(
            service.page_state(PageIndex(4)),
            PageState::Unstarted
        ));
        // in-range bookkeeping is untouched
        assert_eq!(service.page_count(), 1);
    }

    #[test]
    fn corrupt_image_fails_recoverably() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(&[0x55; 64]);
        let source = DocumentSource::new(bytes, None).unwrap();

        let mut service =
            RasterService::open(DocumentId(7), source, &RasterConfig::default()).unwrap();
        let state = wait_for_page(&mut service, PageIndex(1));
        match state {
            PageState::Failed(reason) => assert!(reason.contains("decode failed")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn stalled_requests_expire_and_late_responses_are_dropped() {
        let mut service =
            RasterService::open(DocumentId(3), png_source(), &RasterConfig::default()).unwrap();
        // let the eager page-1 request finish so it cannot interfere
        wait_for_page(&mut service, PageIndex(1));

        // Fabricate an in-flight request that has already blown its deadline.
        let id = RequestId::new(999);
        service.tracker.reset(1);
        service.tracker.begin(PageIndex(1));
        service.pending.insert(
            id,
            Pending {
                page: PageIndex(1),
                issued: Instant::now() - Duration::from_secs(60),
            },
        );

        service.poll();
        match service.page_state(PageIndex(1)) {
            PageState::Failed(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
        assert!(service.pending.is_empty());
    }
}
