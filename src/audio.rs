//! Spoken-explanation playback
//!
//! A small state machine over two trait seams: the speech collaborator that
//! turns the result's spoken text into a decoded PCM clip, and the audio
//! output device that plays it. Pause suspends the live output node so
//! resume continues from the exact position; natural completion is guarded
//! by a play epoch so a completion observed after an intervening pause can
//! never fire. Teardown stops the output unconditionally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::Language;

/// Decoded PCM audio produced by the speech collaborator.
#[derive(Clone, Debug)]
pub struct AudioClip {
    sample_rate: u32,
    channels: u16,
    samples: Arc<Vec<f32>>,
}

impl AudioClip {
    /// Wrap already-decoded interleaved samples.
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            samples: Arc::new(samples),
        }
    }

    /// Decode little-endian 16-bit PCM, the raw format the speech service
    /// returns. A trailing odd byte is ignored.
    #[must_use]
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| {
                let raw = i16::from_le_bytes([pair[0], pair[1]]);
                f32::from(raw) / 32768.0
            })
            .collect();
        Self::new(sample_rate, channels, samples)
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Frames per channel.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Speech synthesis failure. Recoverable: playback degrades to disabled.
#[derive(Debug, thiserror::Error)]
pub enum SpeechFault {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("speech service returned no audio")]
    EmptyAudio,
}

/// The external text-to-speech collaborator.
pub trait SpeechSynthesizer {
    fn synthesize(&self, text: &str, language: Language) -> Result<AudioClip, SpeechFault>;
}

/// Output device failure.
#[derive(Debug, thiserror::Error)]
pub enum AudioFault {
    #[error("audio output: {0}")]
    Output(String),
}

/// An audio output device binding.
///
/// `start` allocates the device's output node for a clip and begins playback
/// from time zero. `suspend`/`resume` pause and continue the same node
/// without reallocation, preserving position. `stop` releases the node.
pub trait AudioOutput {
    fn start(&mut self, clip: &AudioClip) -> Result<(), AudioFault>;
    fn suspend(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);

    /// Playback position within the current clip.
    fn position(&self) -> Duration;

    /// Whether the current clip has played to its natural end.
    fn is_finished(&self) -> bool;

    /// Whether an output node is currently allocated.
    fn is_live(&self) -> bool;
}

/// Wall-clock output: tracks position against the clip duration without an
/// audio device. Serves headless use and as the reference implementation of
/// the suspend/resume contract for real device bindings.
#[derive(Debug, Default)]
pub struct ClockOutput {
    clip_duration: Option<Duration>,
    resumed_at: Option<Instant>,
    elapsed: Duration,
}

impl AudioOutput for ClockOutput {
    fn start(&mut self, clip: &AudioClip) -> Result<(), AudioFault> {
        self.clip_duration = Some(clip.duration());
        self.elapsed = Duration::ZERO;
        self.resumed_at = Some(Instant::now());
        Ok(())
    }

    fn suspend(&mut self) {
        if let Some(resumed_at) = self.resumed_at.take() {
            self.elapsed += resumed_at.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.clip_duration.is_some() && self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.clip_duration = None;
        self.resumed_at = None;
        self.elapsed = Duration::ZERO;
    }

    fn position(&self) -> Duration {
        let running = self
            .resumed_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO);
        let position = self.elapsed + running;
        match self.clip_duration {
            Some(total) => position.min(total),
            None => Duration::ZERO,
        }
    }

    fn is_finished(&self) -> bool {
        match self.clip_duration {
            Some(total) => self.resumed_at.is_some() && self.position() >= total,
            None => false,
        }
    }

    fn is_live(&self) -> bool {
        self.clip_duration.is_some()
    }
}

/// Playback state as reported to the enclosing view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Speech synthesis in flight
    Loading,
    /// Ready (or degraded, when no clip arrived)
    Idle,
    Playing,
    Paused,
}

/// The playback state machine. One per mounted result view; never shared.
pub struct PlaybackController<O: AudioOutput> {
    state: PlaybackState,
    clip: Option<AudioClip>,
    output: O,
    play_epoch: u64,
}

impl<O: AudioOutput> PlaybackController<O> {
    /// A fresh controller starts in `Loading`, waiting for the clip.
    #[must_use]
    pub fn new(output: O) -> Self {
        Self {
            state: PlaybackState::Loading,
            clip: None,
            output,
            play_epoch: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether toggle would do anything: a clip is held or playback is live.
    #[must_use]
    pub fn can_play(&self) -> bool {
        self.clip.is_some()
    }

    /// Epoch of the current playback run, for completion callbacks.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.play_epoch
    }

    #[must_use]
    pub fn output(&self) -> &O {
        &self.output
    }

    /// The synthesized clip arrived.
    pub fn clip_ready(&mut self, clip: AudioClip) {
        if self.state == PlaybackState::Loading {
            self.state = PlaybackState::Idle;
        }
        self.clip = Some(clip);
    }

    /// Speech synthesis failed: degrade silently. The control reads as
    /// disabled but the surrounding view keeps working.
    pub fn clip_failed(&mut self, fault: &SpeechFault) {
        log::warn!("speech synthesis failed, playback disabled: {fault}");
        if self.state == PlaybackState::Loading {
            self.state = PlaybackState::Idle;
        }
        self.clip = None;
    }

    /// The single play/pause/resume control.
    ///
    /// Idle starts a fresh output node from time zero; Playing suspends it;
    /// Paused resumes the same node at the suspended position. Loading, or
    /// Idle without a clip, is a no-op.
    pub fn toggle(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Loading => {}

            PlaybackState::Idle => {
                if let Some(clip) = self.clip.clone() {
                    match self.output.start(&clip) {
                        Ok(()) => {
                            self.play_epoch += 1;
                            self.state = PlaybackState::Playing;
                        }
                        Err(fault) => {
                            log::warn!("audio output failed to start: {fault}");
                        }
                    }
                }
            }

            PlaybackState::Playing => {
                self.output.suspend();
                self.play_epoch += 1;
                self.state = PlaybackState::Paused;
            }

            PlaybackState::Paused => {
                self.output.resume();
                self.play_epoch += 1;
                self.state = PlaybackState::Playing;
            }
        }

        self.state
    }

    /// Natural-completion callback for device bindings. Fires only when the
    /// epoch still matches, so a completion raced by a pause (or by a later
    /// restart) is ignored.
    pub fn on_complete(&mut self, epoch: u64) {
        if epoch == self.play_epoch && self.state == PlaybackState::Playing {
            self.output.stop();
            self.state = PlaybackState::Idle;
        }
    }

    /// Poll-driven completion check for outputs without callbacks.
    /// Returns true when the state changed.
    pub fn poll(&mut self) -> bool {
        if self.state == PlaybackState::Playing && self.output.is_finished() {
            self.on_complete(self.play_epoch);
            return true;
        }
        false
    }

    /// Reset for a new document: stop any live node, drop the old clip and
    /// wait for fresh speech.
    pub fn reset(&mut self) {
        self.output.stop();
        self.clip = None;
        self.state = PlaybackState::Loading;
        self.play_epoch += 1;
    }

    /// Stop any live output and release the node. Mandatory on view
    /// unmount and document reset, whatever the current state.
    pub fn shutdown(&mut self) {
        self.output.stop();
        self.clip = None;
        self.state = PlaybackState::Idle;
    }
}

impl<O: AudioOutput> Drop for PlaybackController<O> {
    fn drop(&mut self) {
        self.output.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted output that records node allocations and positions.
    #[derive(Debug, Default)]
    struct ScriptedOutput {
        starts: u64,
        stops: u64,
        live: bool,
        suspended: bool,
        position_ms: u64,
        finished: bool,
    }

    impl AudioOutput for ScriptedOutput {
        fn start(&mut self, _clip: &AudioClip) -> Result<(), AudioFault> {
            self.starts += 1;
            self.live = true;
            self.suspended = false;
            self.position_ms = 0;
            self.finished = false;
            Ok(())
        }

        fn suspend(&mut self) {
            self.suspended = true;
        }

        fn resume(&mut self) {
            self.suspended = false;
        }

        fn stop(&mut self) {
            self.live = false;
            self.stops += 1;
        }

        fn position(&self) -> Duration {
            Duration::from_millis(self.position_ms)
        }

        fn is_finished(&self) -> bool {
            self.finished
        }

        fn is_live(&self) -> bool {
            self.live
        }
    }

    fn clip() -> AudioClip {
        AudioClip::new(24_000, 1, vec![0.0; 24_000])
    }

    #[test]
    fn pcm16_decodes_to_unit_range() {
        let bytes = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x00];
        let clip = AudioClip::from_pcm16(&bytes, 24_000, 1);
        assert_eq!(clip.samples().len(), 3);
        assert!((clip.samples()[0] + 1.0).abs() < 1e-4);
        assert!((clip.samples()[1] - 0.99997).abs() < 1e-4);
        assert_eq!(clip.samples()[2], 0.0);
        assert_eq!(clip.frames(), 3);
    }

    #[test]
    fn clip_duration_accounts_for_channels() {
        let clip = AudioClip::new(24_000, 2, vec![0.0; 48_000]);
        assert_eq!(clip.duration(), Duration::from_secs(1));
    }

    #[test]
    fn loads_then_idles_on_success_and_failure() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        assert_eq!(controller.state(), PlaybackState::Loading);
        controller.clip_ready(clip());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.can_play());

        let mut degraded = PlaybackController::new(ScriptedOutput::default());
        degraded.clip_failed(&SpeechFault::EmptyAudio);
        assert_eq!(degraded.state(), PlaybackState::Idle);
        assert!(!degraded.can_play());
    }

    #[test]
    fn toggle_without_clip_is_a_no_op() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        assert_eq!(controller.toggle(), PlaybackState::Loading);

        controller.clip_failed(&SpeechFault::EmptyAudio);
        assert_eq!(controller.toggle(), PlaybackState::Idle);
        assert_eq!(controller.output().starts, 0);
    }

    #[test]
    fn pause_resume_reuses_the_same_node() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        controller.clip_ready(clip());

        assert_eq!(controller.toggle(), PlaybackState::Playing);
        assert_eq!(controller.toggle(), PlaybackState::Paused);
        assert!(controller.output().suspended);
        assert_eq!(controller.toggle(), PlaybackState::Playing);
        assert!(!controller.output().suspended);

        // one node for the whole run: no reallocation on resume
        assert_eq!(controller.output().starts, 1);
        assert!(controller.output().is_live());
    }

    #[test]
    fn completion_after_pause_does_not_fire() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        controller.clip_ready(clip());

        controller.toggle();
        let epoch_while_playing = controller.epoch();
        controller.toggle(); // pause

        controller.on_complete(epoch_while_playing);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert!(controller.output().is_live());
    }

    #[test]
    fn natural_completion_returns_to_idle() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        controller.clip_ready(clip());
        controller.toggle();

        controller.output.finished = true;
        assert!(controller.poll());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.output().is_live());

        // idle again: toggling allocates a fresh node
        assert_eq!(controller.toggle(), PlaybackState::Playing);
        assert_eq!(controller.output().starts, 2);
    }

    #[test]
    fn reset_returns_to_loading_and_stops_output() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        controller.clip_ready(clip());
        controller.toggle();

        controller.reset();
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert!(!controller.can_play());
        assert!(!controller.output().is_live());

        // a completion from before the reset is stale and must not fire
        controller.clip_ready(clip());
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn shutdown_stops_live_output_in_any_state() {
        let mut controller = PlaybackController::new(ScriptedOutput::default());
        controller.clip_ready(clip());
        controller.toggle();
        controller.toggle(); // paused, node still live

        controller.shutdown();
        assert!(!controller.output().is_live());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.can_play());
    }

    #[test]
    fn clock_output_tracks_suspend_resume_position() {
        let mut output = ClockOutput::default();
        output.start(&clip()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        output.suspend();
        let at_pause = output.position();
        assert!(at_pause >= Duration::from_millis(15));

        // position holds while suspended
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position(), at_pause);

        output.resume();
        std::thread::sleep(Duration::from_millis(5));
        assert!(output.position() >= at_pause);

        output.stop();
        assert!(!output.is_live());
        assert_eq!(output.position(), Duration::ZERO);
    }
}
