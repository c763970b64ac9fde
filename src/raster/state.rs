//! Per-page raster state machine
//!
//! Each page of the current document moves through
//! `Unstarted -> Rendering -> Ready | Failed`. While `Rendering` the view
//! shows a loading indicator; `Failed` carries a message for in-place
//! display and is re-enterable (a new request moves the page back to
//! `Rendering`). Nothing here panics across the component boundary.

use std::sync::Arc;

use crate::analysis::PageIndex;

use super::types::RenderedPage;

/// Rendering state of a single page.
#[derive(Clone, Debug, Default)]
pub enum PageState {
    #[default]
    Unstarted,
    Rendering,
    Ready(Arc<RenderedPage>),
    Failed(String),
}

impl PageState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn ready(&self) -> Option<&Arc<RenderedPage>> {
        match self {
            Self::Ready(page) => Some(page),
            _ => None,
        }
    }
}

/// Tracks the state of every page in the current document.
#[derive(Debug, Default)]
pub struct PageTracker {
    states: Vec<PageState>,
}

impl PageTracker {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        let mut states = Vec::new();
        states.resize_with(page_count, PageState::default);
        Self { states }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.states.len()
    }

    /// State of a page. Out-of-range indices read as `Unstarted`; the
    /// service reports the range error through the response path instead.
    #[must_use]
    pub fn state(&self, page: PageIndex) -> &PageState {
        page.0
            .checked_sub(1)
            .and_then(|idx| self.states.get(idx))
            .unwrap_or(&PageState::Unstarted)
    }

    fn slot(&mut self, page: PageIndex) -> Option<&mut PageState> {
        page.0.checked_sub(1).and_then(|idx| self.states.get_mut(idx))
    }

    /// Move a page into `Rendering`. Returns false when the page is already
    /// rendering or ready, so duplicate requests can be skipped.
    pub fn begin(&mut self, page: PageIndex) -> bool {
        match self.slot(page) {
            Some(state @ (PageState::Unstarted | PageState::Failed(_))) => {
                *state = PageState::Rendering;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&mut self, page: PageIndex, data: Arc<RenderedPage>) {
        if let Some(state) = self.slot(page) {
            *state = PageState::Ready(data);
        }
    }

    pub fn fail(&mut self, page: PageIndex, reason: String) {
        if let Some(state) = self.slot(page) {
            // A page that already made it to Ready stays Ready; a late
            // failure for it carries no information the view needs.
            if !state.is_ready() {
                *state = PageState::Failed(reason);
            }
        }
    }

    /// Forget everything, e.g. when the source document changes.
    pub fn reset(&mut self, page_count: usize) {
        self.states.clear();
        self.states.resize_with(page_count, PageState::default);
    }
}
