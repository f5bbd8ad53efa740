use std::f32::consts::TAU;

use glam::Vec2;
use serde::Deserialize;

use super::canvas::{Canvas, Rgba};
use super::{Frame, RenderStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircularStyle {
    pub line_width: f32,
    /// Distance kept between the outer ring and the nearest surface edge.
    pub margin: f32,
}

impl Default for CircularStyle {
    fn default() -> Self {
        Self { line_width: 2.0, margin: 20.0 }
    }
}

const HUB_COLOR: u32 = 0x111111;

/// Radial spectrum: one spoke per bin, hue by bin index.
pub struct CircularStrategy {
    style: CircularStyle,
}

impl CircularStrategy {
    pub fn new(style: CircularStyle) -> Self {
        Self { style }
    }

    /// Inner and outer end of the spoke for bin `i` of `bins`.
    pub fn spoke(&self, center: Vec2, radius: f32, i: usize, bins: usize, byte: u8) -> (Vec2, Vec2) {
        let angle = TAU * i as f32 / bins as f32;
        let dir = Vec2::new(angle.cos(), angle.sin());
        let inner = radius / 2.0;
        let length = byte as f32 / 255.0 * radius / 2.0;
        (center + dir * inner, center + dir * (inner + length))
    }
}

impl RenderStrategy for CircularStrategy {
    fn name(&self) -> &'static str {
        "circular"
    }

    fn render(&self, canvas: &mut dyn Canvas, frame: &Frame<'_>) {
        let (w, h) = canvas.size();
        let center = Vec2::new(w as f32 / 2.0, h as f32 / 2.0);
        let radius = (center.x.min(center.y) - self.style.margin).max(0.0);
        canvas.clear(Rgba::BLACK);
        canvas.fill_circle(center, radius / 4.0, Rgba::hex(HUB_COLOR));

        let bins = frame.spectrum.len();
        for (i, &byte) in frame.spectrum.iter().enumerate() {
            let (from, to) = self.spoke(center, radius, i, bins, byte);
            let hue = 360.0 * i as f32 / bins as f32;
            canvas.stroke_line(from, to, self.style.line_width, Rgba::hsl(hue, 1.0, 0.5));
        }
    }
}
