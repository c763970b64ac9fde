//! Cross-highlighting between the findings list and the document view
//!
//! Hovering or tapping a finding highlights its location on the document;
//! clicking additionally brings the document into view and switches pages
//! when needed. Deriving the highlight from a finding is pure; only the
//! returned side effects depend on the environment.

use crate::analysis::{Finding, PageIndex};
use crate::geometry::NormalizedBox;

/// The single transient highlight over the document, at most one at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HighlightState {
    pub bounds: Option<NormalizedBox>,
    pub page: Option<PageIndex>,
}

impl HighlightState {
    /// The cleared state: nothing highlighted.
    #[must_use]
    pub fn cleared() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bounds.is_some()
    }
}

/// Pure derivation of a highlight from a finding. A finding without bounds
/// clears the highlight instead of setting one.
#[must_use]
pub fn highlight_for(finding: &Finding) -> HighlightState {
    match finding.bounds {
        Some(bounds) => HighlightState {
            bounds: Some(bounds),
            page: Some(finding.page.unwrap_or_default()),
        },
        None => HighlightState::cleared(),
    }
}

/// User interaction with an item in the findings list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    /// Hover in / touch down
    Enter,
    /// Hover out
    Leave,
    /// Explicit "show me" click
    Locate,
}

/// Environment-dependent commands the enclosing view must carry out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect {
    /// Scroll the document panel into view
    ScrollToDocument,
    /// On narrow viewports, switch the split view to the document panel
    FocusDocumentPanel,
    /// Display a different page
    SwitchPage(PageIndex),
}

/// What the coordinator needs to know about the surrounding view.
#[derive(Clone, Copy, Debug)]
pub struct ViewerEnv {
    pub narrow_viewport: bool,
    pub current_page: PageIndex,
}

/// Owns the highlight and applies finding interactions to it.
#[derive(Debug, Default)]
pub struct Coordinator {
    state: HighlightState,
}

impl Coordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &HighlightState {
        &self.state
    }

    /// Apply an interaction and return the side effects to execute.
    ///
    /// Enter sets the highlight (or clears it for an unlocatable finding),
    /// Leave clears it, Locate sets it and asks the environment to bring
    /// the location into view. An unlocatable finding never produces
    /// effects and never moves the highlight away from cleared.
    pub fn interact(
        &mut self,
        finding: &Finding,
        kind: InteractionKind,
        env: &ViewerEnv,
    ) -> Vec<SideEffect> {
        match kind {
            InteractionKind::Enter => {
                self.state = highlight_for(finding);
                vec![]
            }

            InteractionKind::Leave => {
                self.state = HighlightState::cleared();
                vec![]
            }

            InteractionKind::Locate => {
                let target = highlight_for(finding);
                if !target.is_active() {
                    return vec![];
                }

                self.state = target;

                let mut effects = vec![SideEffect::ScrollToDocument];
                if env.narrow_viewport {
                    effects.push(SideEffect::FocusDocumentPanel);
                }
                if let Some(page) = target.page {
                    if page != env.current_page {
                        effects.push(SideEffect::SwitchPage(page));
                    }
                }
                effects
            }
        }
    }

    /// Drop any active highlight, e.g. on document reset.
    pub fn clear(&mut self) {
        self.state = HighlightState::cleared();
    }
}
