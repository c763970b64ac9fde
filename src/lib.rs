// Export modules for use in tests
pub mod analysis;
pub mod audio;
pub mod geometry;
pub mod highlight;
pub mod overlay;
pub mod raster;
pub mod session;
pub mod theme;

// Re-export the session-facing surface
pub use analysis::{AnalysisResult, Finding, Language, PageIndex};
pub use audio::{AudioClip, AudioOutput, ClockOutput, PlaybackState, SpeechSynthesizer};
pub use highlight::{HighlightState, InteractionKind, SideEffect};
pub use raster::{DocumentSource, RasterConfig};
pub use session::{PageView, ResultSession, SessionConfig};
