use glam::Vec2;
use serde::Deserialize;

use super::canvas::{Canvas, ColorStop, Fill, Rgba};
use super::{Frame, RenderStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BarsStyle {
    /// Bar width as a multiple of `width / bins`.
    pub width_scale: f32,
    /// Horizontal gap between bars in pixels.
    pub gap: f32,
}

impl Default for BarsStyle {
    fn default() -> Self {
        Self { width_scale: 2.5, gap: 1.0 }
    }
}

/// Frequency bar chart with a purple gradient running from base to tip.
pub struct BarsStrategy {
    style: BarsStyle,
    stops: [ColorStop; 3],
}

impl BarsStrategy {
    pub fn new(style: BarsStyle) -> Self {
        Self {
            style,
            stops: [
                ColorStop::new(0.0, Rgba::hex(0x4a148c)),
                ColorStop::new(0.5, Rgba::hex(0x7b1fa2)),
                ColorStop::new(1.0, Rgba::hex(0xe040fb)),
            ],
        }
    }

    pub fn bar_width(&self, surface_width: f32, bins: usize) -> f32 {
        if bins == 0 {
            return 0.0;
        }
        surface_width / bins as f32 * self.style.width_scale
    }
}

impl RenderStrategy for BarsStrategy {
    fn name(&self) -> &'static str {
        "bars"
    }

    fn render(&self, canvas: &mut dyn Canvas, frame: &Frame<'_>) {
        let (w, h) = canvas.size();
        let (w, h) = (w as f32, h as f32);
        canvas.clear(Rgba::BLACK);

        let bar_width = self.bar_width(w, frame.spectrum.len());
        let mut x = 0.0;
        for &byte in frame.spectrum {
            let bar_height = byte as f32 / 255.0 * h;
            // Each bar carries the full ramp, so quiet bars still reach the tip colour.
            let fill = Fill::LinearGradient {
                from: Vec2::new(0.0, h),
                to: Vec2::new(0.0, h - bar_height),
                stops: &self.stops,
            };
            canvas.fill_rect(Vec2::new(x, h - bar_height), Vec2::new(bar_width, bar_height), &fill);
            x += bar_width + self.style.gap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::VisualParameters;
    use crate::render::display_list::{DisplayList, DrawCmd, RecordedFill};
    use crate::render::raster::Raster;

    #[test]
    fn test_single_full_bin_draws_one_full_bar() {
        let params = VisualParameters::default();
        let mut spectrum = vec![0u8; 1024];
        spectrum[0] = 255;
        let frame = Frame { waveform: &[], spectrum: &spectrum, params: &params, time: 0.0 };
        let mut canvas = DisplayList::new(1024, 400);
        BarsStrategy::new(BarsStyle::default()).render(&mut canvas, &frame);

        let rects: Vec<_> = canvas.rects().collect();
        assert_eq!(rects.len(), 1024);
        assert_eq!(rects[0].0, Vec2::new(0.0, 0.0));
        assert_eq!(rects[0].1, Vec2::new(2.5, 400.0));
        assert!(rects[1..].iter().all(|(origin, size)| size.y == 0.0 && origin.y == 400.0));
        assert_eq!(rects[1].0.x, 3.5);
    }

    #[test]
    fn test_gradient_spans_each_bar() {
        let params = VisualParameters::default();
        let spectrum = [255u8, 51];
        let frame = Frame { waveform: &[], spectrum: &spectrum, params: &params, time: 0.0 };
        let mut canvas = DisplayList::new(100, 100);
        BarsStrategy::new(BarsStyle::default()).render(&mut canvas, &frame);

        let ends: Vec<(Vec2, Vec2)> = canvas
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCmd::FillRect { fill: RecordedFill::LinearGradient { from, to, .. }, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(ends.len(), 2);
        assert_eq!(ends[0], (Vec2::new(0.0, 100.0), Vec2::new(0.0, 0.0)));
        assert_eq!(ends[1].0, Vec2::new(0.0, 100.0));
        assert!((ends[1].1.y - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_half_height_bar_reaches_tip_colour() {
        let params = VisualParameters::default();
        let spectrum = [128u8];
        let frame = Frame { waveform: &[], spectrum: &spectrum, params: &params, time: 0.0 };
        let mut raster = Raster::new(10, 100);
        BarsStrategy::new(BarsStyle::default()).render(&mut raster, &frame);

        // #e040fb at the tip, #4a148c at the base.
        let tip = raster.pixel(2, 50);
        assert!(tip[0] > 200 && tip[2] > 230, "tip was {tip:?}");
        let base = raster.pixel(2, 99);
        assert!(base[0] < 90 && base[1] < 40, "base was {base:?}");
        assert_eq!(raster.pixel(2, 40), [0, 0, 0, 255]);
    }

    #[test]
    fn test_empty_spectrum_only_clears() {
        let params = VisualParameters::default();
        let frame = Frame { waveform: &[], spectrum: &[], params: &params, time: 0.0 };
        let mut canvas = DisplayList::new(64, 64);
        BarsStrategy::new(BarsStyle::default()).render(&mut canvas, &frame);
        assert_eq!(canvas.commands().len(), 1);
        assert_eq!(canvas.rects().count(), 0);
    }
}
