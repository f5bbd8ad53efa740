use std::sync::mpsc::Sender;

use super::decode::AudioData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Ended,
}

/// Notifications pushed from a source to whoever drives the frame loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    Play(SourceId),
    Pause(SourceId),
    Ended(SourceId),
    Seeked(SourceId, f64),
}

impl PlaybackEvent {
    pub fn source(&self) -> SourceId {
        match *self {
            PlaybackEvent::Play(id)
            | PlaybackEvent::Pause(id)
            | PlaybackEvent::Ended(id)
            | PlaybackEvent::Seeked(id, _) => id,
        }
    }
}

/// One decoded stream plus its transport state.
///
/// The position only moves when the host clock calls [`SignalSource::advance`].
pub struct SignalSource {
    id: SourceId,
    label: String,
    audio: AudioData,
    state: PlaybackState,
    position: f64,
    events: Sender<PlaybackEvent>,
}

impl SignalSource {
    pub(crate) fn new(id: SourceId, label: String, audio: AudioData, events: Sender<PlaybackEvent>) -> Self {
        Self {
            id,
            label,
            audio,
            state: PlaybackState::Stopped,
            position: 0.0,
            events,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    fn emit(&self, event: PlaybackEvent) {
        // The receiver lives as long as the owning visualizer; a closed
        // channel only means nobody is listening anymore.
        if self.events.send(event).is_err() {
            log::debug!("Dropped {:?}: no listener", event);
        }
    }

    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Ended => {
                self.position = 0.0;
                self.state = PlaybackState::Playing;
                self.emit(PlaybackEvent::Play(self.id));
            }
            PlaybackState::Stopped | PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                self.emit(PlaybackEvent::Play(self.id));
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.emit(PlaybackEvent::Pause(self.id));
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };
        self.position = target;
        if self.state == PlaybackState::Ended && target < self.duration() {
            self.state = PlaybackState::Paused;
        }
        self.emit(PlaybackEvent::Seeked(self.id, target));
    }

    pub fn restart(&mut self) {
        self.seek(0.0);
        self.play();
    }

    /// Moves the playhead by `dt` seconds while playing.
    pub fn advance(&mut self, dt: f64) {
        if self.state != PlaybackState::Playing || dt <= 0.0 {
            return;
        }
        self.position += dt;
        let duration = self.duration();
        if self.position >= duration {
            self.position = duration;
            self.state = PlaybackState::Ended;
            log::info!("Playback ended: {}", self.label);
            self.emit(PlaybackEvent::Ended(self.id));
        }
    }

    /// Fills `out` with the most recent samples ending at the playhead,
    /// zero padded where the window reaches before the start.
    pub fn copy_window(&self, out: &mut [f32]) {
        let samples = &self.audio.samples;
        let end = ((self.position * self.audio.sample_rate as f64) as usize).min(samples.len());
        let start = end.saturating_sub(out.len());
        let available = end - start;
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        out[pad..].copy_from_slice(&samples[start..end]);
    }
}
