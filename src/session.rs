//! Result session: the active document view
//!
//! Owns the one `HighlightState` and the one `PlaybackController` for the
//! mounted result view, plus the rasterizer for the current document. Every
//! asynchronously-arriving continuation (analysis result, synthesized
//! speech, rasterized page) is checked against the current document
//! generation before it may touch state; anything stale is discarded.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::analysis::{AnalysisResult, Finding, Language, PageIndex};
use crate::audio::{AudioClip, AudioOutput, PlaybackController, PlaybackState, SpeechFault};
use crate::geometry::Zoom;
use crate::highlight::{Coordinator, HighlightState, InteractionKind, SideEffect, ViewerEnv};
use crate::overlay::{compose, ComposedPage};
use crate::raster::{DocumentId, DocumentSource, PageState, RasterConfig, RasterFault, RasterService};
use crate::theme::OverlayTheme;

// Document generations are process-unique so a response can never
// accidentally match a session it does not belong to.
static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Session-level configuration.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Target language for the spoken explanation
    pub language: Language,
    /// Whether the viewport is too narrow for a side-by-side layout
    pub narrow_viewport: bool,
    /// Rasterizer tuning
    pub raster: RasterConfig,
}

/// What the document panel shows for the current page.
#[derive(Debug)]
pub enum PageView {
    /// Rasterization in flight: show a loading indicator
    Loading,
    /// Decode failed: show the message in place, render no annotations
    Failed(String),
    /// Page plus overlay, ready for display
    Composed(ComposedPage),
}

/// The mounted result view for one scanned document.
pub struct ResultSession<O: AudioOutput> {
    doc: DocumentId,
    config: SessionConfig,
    raster: RasterService,
    analysis: Option<AnalysisResult>,
    coordinator: Coordinator,
    playback: PlaybackController<O>,
    current_page: PageIndex,
    zoom: Zoom,
    theme: OverlayTheme,
}

impl<O: AudioOutput> ResultSession<O> {
    /// Mount a session for an uploaded document. Rasterization of page 1
    /// starts immediately; playback starts in `Loading` until speech
    /// arrives via [`deliver_speech`](Self::deliver_speech).
    pub fn open(
        source: DocumentSource,
        config: SessionConfig,
        output: O,
    ) -> Result<Self, RasterFault> {
        let doc = next_document_id();
        let raster = RasterService::open(doc, source, &config.raster)?;

        Ok(Self {
            doc,
            config,
            raster,
            analysis: None,
            coordinator: Coordinator::new(),
            playback: PlaybackController::new(output),
            current_page: PageIndex(1),
            zoom: Zoom::default(),
            theme: OverlayTheme::default(),
        })
    }

    /// The generation of the currently mounted document. Continuations must
    /// pass this back to prove they are still relevant.
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.doc
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.config.language
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.raster.page_count()
    }

    #[must_use]
    pub fn current_page(&self) -> PageIndex {
        self.current_page
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom.factor()
    }

    #[must_use]
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    /// The findings list for display, empty until the analysis arrives.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        self.analysis
            .as_ref()
            .map(AnalysisResult::findings)
            .unwrap_or_default()
    }

    /// Rendering state of a page, for progress display.
    #[must_use]
    pub fn page_state(&self, page: PageIndex) -> &PageState {
        self.raster.page_state(page)
    }

    #[must_use]
    pub fn highlight(&self) -> &HighlightState {
        self.coordinator.state()
    }

    #[must_use]
    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// The analysis continuation resolved. Returns false (and changes
    /// nothing) when it belongs to a superseded document.
    pub fn deliver_analysis(&mut self, doc: DocumentId, result: AnalysisResult) -> bool {
        if doc != self.doc {
            log::debug!("session: discarding analysis for stale document {doc:?}");
            return false;
        }
        self.analysis = Some(result);
        true
    }

    /// The speech continuation resolved. A failure degrades playback to
    /// disabled; a stale document id discards the clip entirely.
    pub fn deliver_speech(
        &mut self,
        doc: DocumentId,
        result: Result<AudioClip, SpeechFault>,
    ) -> bool {
        if doc != self.doc {
            log::debug!("session: discarding speech for stale document {doc:?}");
            return false;
        }
        match result {
            Ok(clip) => self.playback.clip_ready(clip),
            Err(fault) => self.playback.clip_failed(&fault),
        }
        true
    }

    /// Play/pause/resume the explanation.
    pub fn toggle_playback(&mut self) -> PlaybackState {
        self.playback.toggle()
    }

    /// Apply a findings-list interaction. Page switches are executed against
    /// the rasterizer here; the full effect list is still returned so the
    /// environment can scroll and refocus panels.
    pub fn interact(&mut self, finding: &Finding, kind: InteractionKind) -> Vec<SideEffect> {
        let env = ViewerEnv {
            narrow_viewport: self.config.narrow_viewport,
            current_page: self.current_page,
        };
        let effects = self.coordinator.interact(finding, kind, &env);

        for effect in &effects {
            if let SideEffect::SwitchPage(page) = effect {
                self.set_page(*page);
            }
        }

        effects
    }

    /// Switch the displayed page, kicking off rasterization if needed.
    pub fn set_page(&mut self, page: PageIndex) {
        if page.0 == 0 || page.0 > self.raster.page_count() {
            log::warn!("session: ignoring switch to out-of-range page {page}");
            return;
        }
        self.current_page = page;
        self.raster.request_page(page);
    }

    pub fn set_zoom(&mut self, factor: f32) {
        self.zoom.set(factor);
    }

    pub fn zoom_in(&mut self) {
        self.zoom.step_in();
    }

    pub fn zoom_out(&mut self) {
        self.zoom.step_out();
    }

    /// Drive pending work: apply raster responses and the playback
    /// completion check. Returns true when any visible state changed.
    pub fn poll(&mut self) -> bool {
        let raster_changes = self.raster.poll();
        let playback_changed = self.playback.poll();
        raster_changes > 0 || playback_changed
    }

    /// The document panel's view of the current page. Annotations are
    /// composed only over a ready raster; while rendering the panel shows a
    /// loading indicator and a decode failure is reported in place.
    pub fn compose_current_page(&self) -> PageView {
        match self.raster.page_state(self.current_page) {
            PageState::Unstarted | PageState::Rendering => PageView::Loading,
            PageState::Failed(reason) => PageView::Failed(reason.clone()),
            PageState::Ready(page) => {
                let annotations = self
                    .analysis
                    .as_ref()
                    .map(|a| a.annotations.as_slice())
                    .unwrap_or(&[]);
                match compose(
                    page,
                    annotations,
                    self.coordinator.state(),
                    self.zoom.factor(),
                    &self.theme,
                ) {
                    Ok(composed) => PageView::Composed(composed),
                    Err(fault) => PageView::Failed(fault.to_string()),
                }
            }
        }
    }

    /// Scan another document: tear down playback, drop the highlight and
    /// the old analysis, and mount a fresh rasterizer under a new document
    /// generation. Continuations keyed to the old generation will be
    /// discarded from here on.
    pub fn rescan(&mut self, source: DocumentSource) -> Result<(), RasterFault> {
        let doc = next_document_id();
        let raster = RasterService::open(doc, source, &self.config.raster)?;

        // Back to Loading: the new document's speech is in flight again.
        self.playback.reset();
        self.coordinator.clear();
        self.analysis = None;
        self.doc = doc;
        self.raster = raster;
        self.current_page = PageIndex(1);
        self.zoom = Zoom::default();

        Ok(())
    }
}
