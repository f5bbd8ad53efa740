use glam::Vec2;
use serde::Deserialize;

use super::canvas::{Canvas, Rgba};
use super::{Frame, RenderStrategy};
use crate::audio::analyzer::SILENT_SAMPLE;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaveformStyle {
    pub line_width: f32,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self { line_width: 2.0 }
    }
}

const TRACE_COLOR: u32 = 0x00d9ff;

/// Oscilloscope trace of the time-domain buffer.
pub struct WaveformStrategy {
    style: WaveformStyle,
}

impl WaveformStrategy {
    pub fn new(style: WaveformStyle) -> Self {
        Self { style }
    }
}

/// Polyline for `samples` across a `width` x `height` surface.
///
/// Sample `i` sits at `x = i * width / n`; a byte of 128 lands on the vertical
/// midpoint. The trace closes at the right edge on the midline.
pub fn trace(samples: &[u8], width: f32, height: f32) -> Vec<Vec2> {
    let mid = height / 2.0;
    if samples.is_empty() {
        return vec![Vec2::new(0.0, mid), Vec2::new(width, mid)];
    }
    let slice = width / samples.len() as f32;
    samples
        .iter()
        .enumerate()
        .map(|(i, &b)| Vec2::new(i as f32 * slice, b as f32 / SILENT_SAMPLE as f32 * mid))
        .chain(std::iter::once(Vec2::new(width, mid)))
        .collect()
}

impl RenderStrategy for WaveformStrategy {
    fn name(&self) -> &'static str {
        "waveform"
    }

    fn render(&self, canvas: &mut dyn Canvas, frame: &Frame<'_>) {
        let (w, h) = canvas.size();
        canvas.clear(Rgba::BLACK);
        let points = trace(frame.waveform, w as f32, h as f32);
        canvas.stroke_polyline(&points, self.style.line_width, Rgba::hex(TRACE_COLOR));
    }
}
