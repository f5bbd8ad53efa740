//! Owns one visualization session: the audio graph, the surface and the loop.

use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec2;
use serde::Deserialize;

use crate::audio::decode::{decode_stream, AudioData, StreamHandle};
use crate::audio::{AnalyzerConfig, AudioContext, PlaybackEvent, SignalSource, SourceId, SpectralAnalyzer, TapId};
use crate::error::{Result, VizError};
use crate::mapper::{MapperConfig, ParameterMapper, VisualParameters};
use crate::render::{Canvas, Frame, Mode, RenderConfig, Strategies};
use crate::scheduler::{AnimationHandle, FrameScheduler};

/// Analysis frame size per mode.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FftSizes {
    pub waveform: usize,
    pub bars: usize,
    pub circular: usize,
    pub procedural3d: usize,
}

impl Default for FftSizes {
    fn default() -> Self {
        Self {
            waveform: 2048,
            bars: 2048,
            circular: 2048,
            procedural3d: 256,
        }
    }
}

impl FftSizes {
    pub fn for_mode(&self, mode: Mode) -> usize {
        match mode {
            Mode::Waveform => self.waveform,
            Mode::Bars => self.bars,
            Mode::Circular => self.circular,
            Mode::Procedural3d => self.procedural3d,
        }
    }

    /// Same size for every mode.
    pub fn uniform(size: usize) -> Self {
        Self {
            waveform: size,
            bars: size,
            circular: size,
            procedural3d: size,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisualizerConfig {
    /// Smoothing and decibel range; `fft_size` comes from `fft_sizes`.
    pub analyzer: AnalyzerConfig,
    pub fft_sizes: FftSizes,
    pub mapper: MapperConfig,
    pub render: RenderConfig,
    pub mode: Mode,
}

impl VisualizerConfig {
    pub fn analyzer_for(&self, mode: Mode) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: self.fft_sizes.for_mode(mode),
            ..self.analyzer
        }
    }

    pub fn validate(&self) -> Result<()> {
        for mode in Mode::ALL {
            self.analyzer_for(mode).validate()?;
        }
        self.mapper.validate()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn { handle: AnimationHandle, mode: Mode },
    /// No callback was armed for this display frame.
    Skipped,
}

struct Session {
    source: SignalSource,
    analyzer: SpectralAnalyzer,
    tap: TapId,
}

type Listener = Box<dyn FnMut(&PlaybackEvent)>;

/// Wires a source to an analyzer, a mapper and the active strategy, and keeps
/// teardown in order: cancel the loop, disconnect the tap, dispose the surface,
/// close the audio context.
pub struct Visualizer<S: Canvas> {
    context: AudioContext,
    session: Option<Session>,
    mapper: ParameterMapper,
    strategies: Strategies,
    surface: S,
    scheduler: FrameScheduler,
    mode: Mode,
    config: VisualizerConfig,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
    listeners: Vec<Listener>,
    pending_resize: Option<(u32, u32)>,
    clock: f64,
    frames_drawn: u64,
    disposed: bool,
}

impl<S: Canvas> Visualizer<S> {
    pub fn new(context: AudioContext, surface: S, config: VisualizerConfig) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            context,
            session: None,
            mapper: ParameterMapper::new(config.mapper)?,
            strategies: Strategies::new(&config.render),
            surface,
            scheduler: FrameScheduler::new(),
            mode: config.mode,
            config,
            events_tx,
            events_rx,
            listeners: Vec::new(),
            pending_resize: None,
            clock: 0.0,
            frames_drawn: 0,
            disposed: false,
        })
    }

    fn check_live(&self) -> Result<()> {
        if self.disposed {
            Err(VizError::Disposed)
        } else {
            Ok(())
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.check_live()?;
        self.session.as_mut().ok_or(VizError::NoSource)
    }

    /// Decodes `stream` and makes it the current source.
    ///
    /// On failure nothing changes and the previous source stays active.
    pub fn load(&mut self, stream: &StreamHandle) -> Result<()> {
        self.check_live()?;
        let audio = match decode_stream(stream) {
            Ok(audio) => audio,
            Err(err) => {
                log::warn!("Rejected {}: {}", stream.label(), err);
                return Err(err);
            }
        };
        self.load_audio(audio, stream.label())
    }

    /// Replaces the current source with already decoded audio. The new source
    /// starts stopped.
    pub fn load_audio(&mut self, audio: AudioData, label: impl Into<String>) -> Result<()> {
        self.check_live()?;
        let analyzer_config = self.config.analyzer_for(self.mode);

        self.scheduler.stop();
        if let Some(old) = self.session.take() {
            self.context.disconnect(old.tap);
        }

        let source = self.context.create_source(audio, label, self.events_tx.clone())?;
        let tap = self.context.connect_analyser(&source)?;
        let analyzer = SpectralAnalyzer::new(tap, source.id(), analyzer_config)?;
        log::info!(
            "Loaded {} ({:.1}s @ {} Hz)",
            source.label(),
            source.duration(),
            source.sample_rate()
        );
        self.session = Some(Session { source, analyzer, tap });
        self.mapper.reset();
        Ok(())
    }

    /// Starts playback. Fails with `PlaybackBlocked` until the host grants a
    /// user gesture when the context requires one; the same call may be retried.
    pub fn play(&mut self) -> Result<()> {
        self.check_live()?;
        if self.session.is_none() {
            return Err(VizError::NoSource);
        }
        self.context.ensure_running()?;
        self.session_mut()?.source.play();
        self.pump_events();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.session_mut()?.source.pause();
        self.pump_events();
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.session_mut()?.source.seek(seconds);
        self.pump_events();
        Ok(())
    }

    /// Rewinds to the start and plays.
    pub fn restart(&mut self) -> Result<()> {
        self.check_live()?;
        if self.session.is_none() {
            return Err(VizError::NoSource);
        }
        self.context.ensure_running()?;
        self.session_mut()?.source.restart();
        self.pump_events();
        Ok(())
    }

    /// Swaps the strategy the next frame runs. A running loop keeps its handle.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.check_live()?;
        if mode == self.mode {
            return Ok(());
        }
        let fft_size = self.config.fft_sizes.for_mode(mode);
        if let Some(session) = self.session.as_mut() {
            session.analyzer.set_fft_size(fft_size)?;
        }
        log::info!("Visualization mode: {} -> {}", self.mode, mode);
        self.mode = mode;
        Ok(())
    }

    /// Queues a surface resize; applied before the next frame reads the size.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        if !self.disposed {
            self.pending_resize = Some((width, height));
        }
    }

    /// Pointer position in [-1, 1] on both axes; drives camera parallax.
    pub fn pointer_moved(&mut self, position: Vec2) {
        self.mapper.set_pointer(position);
    }

    pub fn grant_user_gesture(&mut self) {
        self.context.grant_user_gesture();
    }

    /// Registers a callback for play, pause, ended and seek notifications of
    /// the current source.
    pub fn subscribe(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// One display refresh: advance the clock and source, handle notifications
    /// and resizes, then run the armed frame if there is one.
    pub fn tick(&mut self, dt: f64) -> FrameOutcome {
        if self.disposed {
            return FrameOutcome::Skipped;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += dt;
        if let Some(session) = self.session.as_mut() {
            session.source.advance(dt);
        }
        self.pump_events();

        if let Some((width, height)) = self.pending_resize.take() {
            self.surface.resize(width, height);
            log::debug!("Surface resized to {}x{}", width, height);
        }

        let Some(handle) = self.scheduler.begin_frame() else {
            return FrameOutcome::Skipped;
        };
        self.draw_frame();
        self.scheduler.end_frame(handle);
        FrameOutcome::Drawn { handle, mode: self.mode }
    }

    fn draw_frame(&mut self) {
        let time = self.clock as f32;
        let strategy = self.strategies.get(self.mode);
        match self.session.as_mut() {
            Some(session) => {
                let buffers = session.analyzer.read_frame(&session.source, self.mode.uses_waveform());
                let params = self.mapper.update(buffers.spectrum.as_slice(), time);
                let frame = Frame {
                    waveform: buffers.waveform.as_slice(),
                    spectrum: buffers.spectrum.as_slice(),
                    params,
                    time,
                };
                strategy.render(&mut self.surface, &frame);
            }
            None => {
                let params = self.mapper.update_idle(time);
                let frame = Frame { waveform: &[], spectrum: &[], params, time };
                strategy.render(&mut self.surface, &frame);
            }
        }
        self.frames_drawn += 1;
    }

    fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            let current = self.session.as_ref().map(|s| s.source.id());
            if current != Some(event.source()) {
                log::debug!("Ignoring {:?} from a replaced source", event);
                continue;
            }
            match event {
                PlaybackEvent::Play(_) => {
                    self.scheduler.start();
                }
                PlaybackEvent::Pause(_) | PlaybackEvent::Ended(_) => self.scheduler.stop(),
                PlaybackEvent::Seeked(..) => {}
            }
            for listener in self.listeners.iter_mut() {
                listener(&event);
            }
        }
    }

    /// Releases everything in dependency order. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.scheduler.dispose();
        if let Some(session) = self.session.take() {
            self.context.disconnect(session.tap);
        }
        self.pending_resize = None;
        self.surface.dispose();
        self.context.close();
        self.listeners.clear();
        log::info!("Visualizer torn down after {} frames", self.frames_drawn);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn params(&self) -> &VisualParameters {
        self.mapper.params()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn source(&self) -> Option<&SignalSource> {
        self.session.as_ref().map(|s| &s.source)
    }

    /// Tap the analyzer reads through, if a source is loaded.
    pub fn analyzer_tap(&self) -> Option<TapId> {
        self.session.as_ref().map(|s| s.analyzer.tap())
    }

    pub fn analyzer_source(&self) -> Option<SourceId> {
        self.session.as_ref().map(|s| s.analyzer.bound_source())
    }

    pub fn analyzer_fft_size(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.analyzer.fft_size())
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Seconds of host time seen so far.
    pub fn clock(&self) -> f64 {
        self.clock
    }
}

impl<S: Canvas> Drop for Visualizer<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AutoplayPolicy, ContextState, PlaybackState};
    use crate::render::DisplayList;

    fn tone(seconds: f32) -> AudioData {
        let sample_rate = 8000;
        let samples = (0..(seconds * sample_rate as f32) as usize)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.8)
            .collect();
        AudioData { samples, sample_rate }
    }

    fn visualizer() -> Visualizer<DisplayList> {
        Visualizer::new(
            AudioContext::new(AutoplayPolicy::Allowed),
            DisplayList::new(320, 240),
            VisualizerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_no_frames_before_play() {
        let mut viz = visualizer();
        viz.load_audio(tone(1.0), "tone").unwrap();
        for _ in 0..10 {
            assert_eq!(viz.tick(1.0 / 60.0), FrameOutcome::Skipped);
        }
        assert_eq!(viz.frames_drawn(), 0);
    }

    #[test]
    fn test_controls_without_source() {
        let mut viz = visualizer();
        assert!(matches!(viz.play(), Err(VizError::NoSource)));
        assert!(matches!(viz.pause(), Err(VizError::NoSource)));
    }

    #[test]
    fn test_tone_drives_energy() {
        let mut viz = visualizer();
        viz.load_audio(tone(2.0), "tone").unwrap();
        viz.play().unwrap();
        for _ in 0..30 {
            viz.tick(1.0 / 60.0);
        }
        assert!(viz.params().average_energy > 0.0);
        assert!(!viz.params().idle);
    }

    #[test]
    fn test_set_mode_resizes_analysis_window() {
        let mut viz = visualizer();
        viz.load_audio(tone(1.0), "tone").unwrap();
        assert_eq!(viz.analyzer_fft_size(), Some(2048));
        viz.set_mode(Mode::Procedural3d).unwrap();
        assert_eq!(viz.analyzer_fft_size(), Some(256));
    }

    #[test]
    fn test_seek_past_end_then_restart() {
        let mut viz = visualizer();
        viz.load_audio(tone(1.0), "tone").unwrap();
        viz.play().unwrap();
        viz.seek(5.0).unwrap();
        viz.tick(0.01);
        assert_eq!(viz.source().map(|s| s.state()), Some(PlaybackState::Ended));
        assert!(!viz.scheduler().is_running());
        viz.restart().unwrap();
        assert_eq!(viz.source().map(|s| s.position()), Some(0.0));
        assert!(viz.scheduler().is_running());
    }

    #[test]
    fn test_controls_after_teardown() {
        let mut viz = visualizer();
        viz.load_audio(tone(1.0), "tone").unwrap();
        viz.teardown();
        viz.teardown();
        assert!(matches!(viz.play(), Err(VizError::Disposed)));
        assert!(matches!(viz.set_mode(Mode::Bars), Err(VizError::Disposed)));
        assert_eq!(viz.context().state(), ContextState::Closed);
        assert_eq!(viz.context().disconnect_count(), 1);
    }
}
