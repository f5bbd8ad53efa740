use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use cosmoscope::audio::{
    AudioContext, AudioData, AutoplayPolicy, ContextState, PlaybackEvent, PlaybackState, StreamHandle,
};
use cosmoscope::mapper::{MapperConfig, ParameterMapper, VisualParameters};
use cosmoscope::render::{
    BarsStrategy, BarsStyle, BloomSettings, Canvas, DisplayList, DrawCmd, Fill, Frame, RenderStrategy, Rgba,
};
use cosmoscope::scheduler::{SchedulerState, ShutdownToken};
use cosmoscope::{FrameOutcome, Mode, Visualizer, VisualizerConfig, VizError};
use glam::Vec2;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const DT: f64 = 1.0 / 60.0;

fn wav_blob(seconds: f32, sample_rate: u32, sample: impl Fn(usize) -> i16) -> StreamHandle {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(seconds * sample_rate as f32) as usize {
            writer.write_sample(sample(i)).unwrap();
        }
        writer.finalize().unwrap();
    }
    StreamHandle::Blob {
        bytes: cursor.into_inner(),
        extension: Some("wav".into()),
    }
}

fn silence(seconds: f32) -> StreamHandle {
    wav_blob(seconds, 8000, |_| 0)
}

fn tone(seconds: f32, hz: f32) -> AudioData {
    let sample_rate = 8000u32;
    let samples = (0..(seconds * sample_rate as f32) as usize)
        .map(|i| (i as f32 * hz * std::f32::consts::TAU / sample_rate as f32).sin() * 0.8)
        .collect();
    AudioData { samples, sample_rate }
}

fn visualizer_with(policy: AutoplayPolicy, mode: Mode) -> Visualizer<DisplayList> {
    let config = VisualizerConfig { mode, ..Default::default() };
    Visualizer::new(AudioContext::new(policy), DisplayList::new(WIDTH, HEIGHT), config).unwrap()
}

fn visualizer() -> Visualizer<DisplayList> {
    visualizer_with(AutoplayPolicy::Allowed, Mode::Waveform)
}

fn record_events(viz: &mut Visualizer<DisplayList>) -> Rc<RefCell<Vec<PlaybackEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    viz.subscribe(move |event| sink.borrow_mut().push(*event));
    events
}

#[test]
fn test_silent_stream_keeps_energy_at_zero_and_draws_a_flat_line() {
    let mut viz = visualizer();
    viz.load(&silence(2.0)).unwrap();
    viz.play().unwrap();

    for _ in 0..60 {
        assert!(matches!(viz.tick(DT), FrameOutcome::Drawn { mode: Mode::Waveform, .. }));
        let params = viz.params();
        assert!(params.average_energy >= 0.0 && params.average_energy <= 1e-6);
        assert!(params.idle);
        assert!(params.intensity.is_finite() && params.intensity > 0.0);

        let lines: Vec<_> = viz.surface().polylines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.iter().all(|p| p.y == HEIGHT as f32 / 2.0));
    }
    assert_eq!(viz.frames_drawn(), 60);
}

#[test]
fn test_single_bass_bin_maps_and_draws_one_full_bar() {
    let mut spectrum = vec![0u8; 1024];
    spectrum[0] = 255;

    let mut mapper = ParameterMapper::new(MapperConfig::default()).unwrap();
    let params = *mapper.update(&spectrum, 0.0);
    assert!((params.bass_energy - 255.0 / 256.0).abs() < 1e-6);

    let mut canvas = DisplayList::new(WIDTH, HEIGHT);
    let frame = Frame { waveform: &[], spectrum: &spectrum, params: &params, time: 0.0 };
    BarsStrategy::new(BarsStyle::default()).render(&mut canvas, &frame);

    let heights: Vec<f32> = canvas.rects().map(|(_, size)| size.y).collect();
    assert_eq!(heights.len(), 1024);
    assert_eq!(heights[0], HEIGHT as f32);
    assert!(heights[1..].iter().all(|&h| h == 0.0));
}

#[test]
fn test_mode_switch_keeps_the_running_loop() {
    let mut viz = visualizer();
    viz.load_audio(tone(2.0, 220.0), "tone").unwrap();
    viz.play().unwrap();

    let FrameOutcome::Drawn { handle, .. } = viz.tick(DT) else {
        panic!("first frame was not drawn");
    };
    viz.set_mode(Mode::Bars).unwrap();
    assert_eq!(viz.scheduler().state(), SchedulerState::Running);
    assert_eq!(viz.scheduler().pending(), Some(handle));

    assert_eq!(viz.tick(DT), FrameOutcome::Drawn { handle, mode: Mode::Bars });
    assert!(viz.surface().rects().count() > 0);
    assert_eq!(viz.surface().polylines().count(), 0);

    viz.set_mode(Mode::Procedural3d).unwrap();
    assert_eq!(viz.tick(DT), FrameOutcome::Drawn { handle, mode: Mode::Procedural3d });
    assert!(matches!(viz.surface().commands().last(), Some(DrawCmd::Bloom(_))));
}

#[test]
fn test_source_swap_disconnects_old_tap_once() {
    let mut viz = visualizer();
    viz.load_audio(tone(2.0, 220.0), "first").unwrap();
    viz.play().unwrap();
    for _ in 0..10 {
        viz.tick(DT);
    }
    let old_tap = viz.analyzer_tap().unwrap();
    let old_source = viz.source().unwrap().id();
    assert_eq!(viz.context().disconnect_count(), 0);

    viz.load_audio(tone(2.0, 880.0), "second").unwrap();
    let new_source = viz.source().unwrap().id();
    assert_ne!(new_source, old_source);
    assert_eq!(viz.context().disconnect_count(), 1);
    assert_eq!(viz.context().tap_source(old_tap), None);
    assert_eq!(viz.context().active_taps(), 1);
    assert_ne!(viz.analyzer_tap(), Some(old_tap));
    assert_eq!(viz.analyzer_source(), Some(new_source));
    assert_eq!(viz.source().unwrap().state(), PlaybackState::Stopped);

    // The swap stopped the loop; nothing runs until the new source plays.
    assert_eq!(viz.tick(DT), FrameOutcome::Skipped);
    viz.play().unwrap();
    assert!(matches!(viz.tick(DT), FrameOutcome::Drawn { .. }));
    assert_eq!(viz.context().tap_source(viz.analyzer_tap().unwrap()), Some(new_source));

    viz.teardown();
    assert_eq!(viz.context().disconnect_count(), 2);
}

#[test]
fn test_no_draws_after_teardown() {
    let mut viz = visualizer();
    viz.load_audio(tone(2.0, 220.0), "tone").unwrap();
    viz.play().unwrap();
    for _ in 0..5 {
        viz.tick(DT);
    }
    let drawn = viz.frames_drawn();
    viz.teardown();

    assert_eq!(viz.scheduler().pending(), None);
    assert_eq!(viz.scheduler().state(), SchedulerState::Disposed);
    assert!(viz.surface().is_disposed());
    for _ in 0..120 {
        assert_eq!(viz.tick(DT), FrameOutcome::Skipped);
    }
    assert_eq!(viz.frames_drawn(), drawn);
    assert!(viz.surface().commands().is_empty());
    assert_eq!(viz.context().active_taps(), 0);
}

#[test]
fn test_pause_twice_matches_pause_once() {
    let mut viz = visualizer();
    let events = record_events(&mut viz);
    viz.load_audio(tone(2.0, 220.0), "tone").unwrap();
    viz.play().unwrap();
    viz.tick(DT);

    viz.pause().unwrap();
    let state = viz.source().unwrap().state();
    let position = viz.source().unwrap().position();
    viz.pause().unwrap();

    assert_eq!(viz.source().unwrap().state(), state);
    assert_eq!(viz.source().unwrap().position(), position);
    assert_eq!(viz.scheduler().state(), SchedulerState::Idle);
    let pauses = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::Pause(_)))
        .count();
    assert_eq!(pauses, 1);
    assert_eq!(viz.tick(DT), FrameOutcome::Skipped);
}

#[test]
fn test_unsupported_media_keeps_previous_source() {
    let mut viz = visualizer();
    viz.load_audio(tone(2.0, 220.0), "keeper").unwrap();
    viz.play().unwrap();
    let tap = viz.analyzer_tap();

    let garbage = StreamHandle::Blob {
        bytes: b"not audio at all".repeat(32),
        extension: Some("mp3".into()),
    };
    assert!(matches!(viz.load(&garbage), Err(VizError::UnsupportedMedia(_))));

    assert_eq!(viz.source().unwrap().label(), "keeper");
    assert_eq!(viz.analyzer_tap(), tap);
    assert_eq!(viz.context().disconnect_count(), 0);
    assert!(matches!(viz.tick(DT), FrameOutcome::Drawn { .. }));
}

#[test]
fn test_blocked_play_succeeds_after_gesture() {
    let mut viz = visualizer_with(AutoplayPolicy::RequiresGesture, Mode::Circular);
    viz.load(&silence(1.0)).unwrap();

    assert!(matches!(viz.play(), Err(VizError::PlaybackBlocked)));
    assert_eq!(viz.source().unwrap().state(), PlaybackState::Stopped);
    assert_eq!(viz.tick(DT), FrameOutcome::Skipped);

    viz.grant_user_gesture();
    viz.play().unwrap();
    assert_eq!(viz.source().unwrap().state(), PlaybackState::Playing);
    assert!(matches!(viz.tick(DT), FrameOutcome::Drawn { mode: Mode::Circular, .. }));
}

#[test]
fn test_resize_is_applied_before_the_next_frame() {
    let mut viz = visualizer();
    viz.load(&silence(1.0)).unwrap();
    viz.play().unwrap();
    viz.tick(DT);

    viz.request_resize(100, 50);
    viz.request_resize(200, 80);
    assert_eq!(viz.surface().size(), (WIDTH, HEIGHT));
    viz.tick(DT);

    assert_eq!(viz.surface().size(), (200, 80));
    let (points, _, _) = viz.surface().polylines().next().unwrap();
    assert_eq!(points.last().copied(), Some(Vec2::new(200.0, 40.0)));
}

#[test]
fn test_natural_end_stops_the_loop() {
    let mut viz = visualizer();
    let events = record_events(&mut viz);
    viz.load_audio(tone(0.25, 220.0), "short").unwrap();
    viz.play().unwrap();

    let mut drawn = 0;
    while let FrameOutcome::Drawn { .. } = viz.tick(DT) {
        drawn += 1;
        assert!(drawn < 100, "loop never stopped");
    }
    assert_eq!(viz.source().unwrap().state(), PlaybackState::Ended);
    assert_eq!(viz.scheduler().pending(), None);
    assert!(events.borrow().iter().any(|e| matches!(e, PlaybackEvent::Ended(_))));

    // Playing again after the end restarts from the top.
    viz.play().unwrap();
    assert!(matches!(viz.tick(DT), FrameOutcome::Drawn { .. }));
    assert!(viz.source().unwrap().position() < 0.1);
}

#[test]
fn test_pointer_moves_camera_toward_target() {
    let mut viz = visualizer_with(AutoplayPolicy::Allowed, Mode::Procedural3d);
    viz.load_audio(tone(1.0, 220.0), "tone").unwrap();
    viz.play().unwrap();
    viz.pointer_moved(Vec2::new(1.0, -1.0));
    let mut last = VisualParameters::default().camera_offset;
    for _ in 0..10 {
        viz.tick(DT);
        let offset = viz.params().camera_offset;
        assert!(offset.x > last.x && offset.y < last.y);
        last = offset;
    }
}

/// What the rest of the session looked like when the surface was disposed.
#[derive(Debug, PartialEq)]
struct DisposeSnapshot {
    loop_disposed: bool,
    active_taps: usize,
    context: ContextState,
}

/// Display list that records the session state at the moment it is disposed.
struct WatchedSurface {
    inner: DisplayList,
    context: AudioContext,
    loop_token: Rc<RefCell<Option<ShutdownToken>>>,
    seen: Rc<RefCell<Vec<DisposeSnapshot>>>,
}

impl Canvas for WatchedSurface {
    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }

    fn clear(&mut self, color: Rgba) {
        self.inner.clear(color);
    }

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        self.inner.stroke_polyline(points, width, color);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, fill: &Fill<'_>) {
        self.inner.fill_rect(origin, size, fill);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.inner.fill_circle(center, radius, color);
    }

    fn fill_triangle(&mut self, points: [Vec2; 3], color: Rgba) {
        self.inner.fill_triangle(points, color);
    }

    fn bloom(&mut self, settings: &BloomSettings) {
        self.inner.bloom(settings);
    }

    fn dispose(&mut self) {
        let loop_disposed = self
            .loop_token
            .borrow()
            .as_ref()
            .is_some_and(|token| token.is_disposed());
        self.seen.borrow_mut().push(DisposeSnapshot {
            loop_disposed,
            active_taps: self.context.active_taps(),
            context: self.context.state(),
        });
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

#[test]
fn test_teardown_cancels_and_disconnects_before_disposing_surface() {
    let context = AudioContext::new(AutoplayPolicy::Allowed);
    let loop_token = Rc::new(RefCell::new(None));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let surface = WatchedSurface {
        inner: DisplayList::new(WIDTH, HEIGHT),
        context: context.clone(),
        loop_token: Rc::clone(&loop_token),
        seen: Rc::clone(&seen),
    };
    let mut viz = Visualizer::new(context.clone(), surface, VisualizerConfig::default()).unwrap();
    *loop_token.borrow_mut() = Some(viz.scheduler().shutdown_token());

    viz.load_audio(tone(1.0, 220.0), "tone").unwrap();
    viz.play().unwrap();
    for _ in 0..5 {
        viz.tick(DT);
    }
    assert_eq!(context.active_taps(), 1);

    viz.teardown();
    viz.teardown();
    drop(viz);

    assert_eq!(
        *seen.borrow(),
        vec![DisposeSnapshot {
            loop_disposed: true,
            active_taps: 0,
            context: ContextState::Running,
        }]
    );
    assert_eq!(context.state(), ContextState::Closed);
    assert_eq!(context.disconnect_count(), 1);
}
