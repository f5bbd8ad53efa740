use glam::Vec2;

use super::bloom;
use super::canvas::{BloomSettings, Canvas, Fill, Rgba};
use super::postprocess::GpuBloom;

/// Largest edge a raster accepts, matching the widest texture the GPU bloom path requests.
pub const MAX_SIDE: u32 = 16_384;

/// Byte length of an RGBA8 frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Software RGBA8 surface. This is what the host presents.
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    gpu_bloom: Option<GpuBloom>,
    disposed: bool,
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Pixel indices whose centres fall in `[lo, hi]`, clipped to `limit`.
fn span(lo: f32, hi: f32, limit: u32) -> Option<(usize, usize)> {
    let first = (lo - 0.5).ceil().max(0.0);
    let last = (hi - 0.5).floor().min(limit as f32 - 1.0);
    if first <= last {
        Some((first as usize, last as usize))
    } else {
        None
    }
}

impl Raster {
    /// Sides are clamped to `1..=MAX_SIDE`.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.clamp(1, MAX_SIDE), height.clamp(1, MAX_SIDE));
        Self {
            width,
            height,
            pixels: vec![0; frame_len(width, height)],
            gpu_bloom: None,
            disposed: false,
        }
    }

    /// Runs bloom passes on the GPU, falling back to the CPU when a pass fails.
    pub fn with_gpu_bloom(mut self, bloom: GpuBloom) -> Self {
        self.gpu_bloom = Some(bloom);
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height || self.disposed {
            return [0; 4];
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2], self.pixels[idx + 3]]
    }

    fn blend(&mut self, x: usize, y: usize, color: Rgba) {
        let a = color.a.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let idx = (y * self.width as usize + x) * 4;
        let px = &mut self.pixels[idx..idx + 4];
        for (dst, src) in px.iter_mut().zip([color.r, color.g, color.b]) {
            let below = *dst as f32 / 255.0;
            let v = src.clamp(0.0, 1.0) * a + below * (1.0 - a);
            *dst = (v * 255.0).round() as u8;
        }
        px[3] = 255;
    }

    fn raster_triangle(&mut self, p: [Vec2; 3], mut shade: impl FnMut(Vec2) -> Rgba) {
        let area = edge(p[0], p[1], p[2]);
        if area.abs() <= f32::EPSILON || !area.is_finite() {
            return;
        }
        let min = p[0].min(p[1]).min(p[2]);
        let max = p[0].max(p[1]).max(p[2]);
        let (Some((x0, x1)), Some((y0, y1))) = (span(min.x, max.x, self.width), span(min.y, max.y, self.height)) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(p[1], p[2], c);
                let w1 = edge(p[2], p[0], c);
                let w2 = edge(p[0], p[1], c);
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if inside {
                    let color = shade(c);
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn stroke_segment(&mut self, a: Vec2, b: Vec2, width: f32, color: Rgba) {
        let dir = b - a;
        let len = dir.length();
        let half = (width * 0.5).max(0.5);
        if len <= 1e-6 {
            self.fill_circle(a, half, color);
            return;
        }
        let n = Vec2::new(-dir.y, dir.x) / len * half;
        self.raster_triangle([a + n, b + n, b - n], |_| color);
        self.raster_triangle([a + n, b - n, a - n], |_| color);
    }
}

impl Canvas for Raster {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.disposed {
            return;
        }
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        if width > MAX_SIDE || height > MAX_SIDE {
            log::warn!(
                "Ignoring resize to {}x{}: sides are limited to {}",
                width,
                height,
                MAX_SIDE
            );
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; frame_len(width, height)];
        if let Some(gpu) = self.gpu_bloom.as_mut() {
            gpu.release_targets();
        }
    }

    fn clear(&mut self, color: Rgba) {
        if self.disposed {
            return;
        }
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let px = [to_byte(color.r), to_byte(color.g), to_byte(color.b), to_byte(color.a)];
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        if self.disposed {
            return;
        }
        match points {
            [] => {}
            [single] => self.fill_circle(*single, (width * 0.5).max(0.5), color),
            _ => {
                for pair in points.windows(2) {
                    self.stroke_segment(pair[0], pair[1], width, color);
                }
            }
        }
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, fill: &Fill<'_>) {
        if self.disposed {
            return;
        }
        let lo = origin.min(origin + size);
        let hi = origin.max(origin + size);
        let (Some((x0, x1)), Some((y0, y1))) = (span(lo.x, hi.x, self.width), span(lo.y, hi.y, self.height)) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let color = fill.color_at(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                self.blend(x, y, color);
            }
        }
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if self.disposed || !(radius > 0.0) {
            return;
        }
        let (Some((x0, x1)), Some((y0, y1))) = (
            span(center.x - radius, center.x + radius, self.width),
            span(center.y - radius, center.y + radius, self.height),
        ) else {
            return;
        };
        let r2 = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if c.distance_squared(center) <= r2 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn fill_triangle(&mut self, points: [Vec2; 3], color: Rgba) {
        if self.disposed {
            return;
        }
        self.raster_triangle(points, |_| color);
    }

    fn bloom(&mut self, settings: &BloomSettings) {
        if self.disposed {
            return;
        }
        if let Some(gpu) = self.gpu_bloom.as_mut() {
            match gpu.apply(&mut self.pixels, self.width, self.height, settings) {
                Ok(()) => return,
                Err(err) => log::warn!("GPU bloom failed, using CPU for this frame: {:#}", err),
            }
        }
        bloom::apply(&mut self.pixels, self.width, self.height, settings);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pixels = Vec::new();
        self.gpu_bloom = None;
        log::debug!("Raster surface disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::ColorStop;

    const WHITE: Rgba = Rgba::rgb(1.0, 1.0, 1.0);

    #[test]
    fn test_clear_fills_every_pixel() {
        let mut raster = Raster::new(4, 3);
        raster.clear(Rgba::rgb(1.0, 0.0, 0.0));
        assert!(raster.pixels().chunks(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn test_horizontal_line_covers_its_row() {
        let mut raster = Raster::new(20, 20);
        raster.clear(Rgba::BLACK);
        raster.stroke_line(Vec2::new(0.0, 10.0), Vec2::new(20.0, 10.0), 2.0, WHITE);
        assert_eq!(raster.pixel(5, 9), [255, 255, 255, 255]);
        assert_eq!(raster.pixel(5, 10), [255, 255, 255, 255]);
        assert_eq!(raster.pixel(5, 5), [0, 0, 0, 255]);
        assert_eq!(raster.pixel(5, 14), [0, 0, 0, 255]);
    }

    #[test]
    fn test_rect_gradient_runs_bottom_to_top() {
        let mut raster = Raster::new(4, 10);
        raster.clear(Rgba::BLACK);
        let stops = [ColorStop::new(0.0, Rgba::BLACK), ColorStop::new(1.0, WHITE)];
        let fill = Fill::LinearGradient {
            from: Vec2::new(0.0, 10.0),
            to: Vec2::new(0.0, 0.0),
            stops: &stops,
        };
        raster.fill_rect(Vec2::new(0.0, 0.0), Vec2::new(4.0, 10.0), &fill);
        assert!(raster.pixel(1, 0)[0] > raster.pixel(1, 9)[0]);
    }

    #[test]
    fn test_zero_height_rect_draws_nothing() {
        let mut raster = Raster::new(8, 8);
        raster.clear(Rgba::BLACK);
        raster.fill_rect(Vec2::new(0.0, 8.0), Vec2::new(4.0, 0.0), &Fill::Solid(WHITE));
        assert!(raster.pixels().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_triangle_winding_does_not_matter() {
        for points in [
            [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)],
            [Vec2::new(0.0, 0.0), Vec2::new(0.0, 10.0), Vec2::new(10.0, 0.0)],
        ] {
            let mut raster = Raster::new(10, 10);
            raster.clear(Rgba::BLACK);
            raster.fill_triangle(points, WHITE);
            assert_eq!(raster.pixel(2, 2), [255, 255, 255, 255]);
            assert_eq!(raster.pixel(9, 9), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_shapes_outside_the_surface_are_clipped() {
        let mut raster = Raster::new(8, 8);
        raster.clear(Rgba::BLACK);
        raster.fill_circle(Vec2::new(-50.0, -50.0), 10.0, WHITE);
        raster.fill_rect(Vec2::new(100.0, 0.0), Vec2::new(5.0, 5.0), &Fill::Solid(WHITE));
        raster.fill_triangle([Vec2::splat(f32::NAN), Vec2::ZERO, Vec2::ONE], WHITE);
        assert!(raster.pixels().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_oversized_resize_keeps_current_surface() {
        let mut raster = Raster::new(8, 8);
        raster.resize(40_000, 30_000);
        assert_eq!(raster.size(), (8, 8));
        assert_eq!(raster.pixels().len(), 8 * 8 * 4);
        raster.clear(WHITE);
        assert_eq!(raster.pixel(7, 7), [255, 255, 255, 255]);

        let clamped = Raster::new(0, MAX_SIDE + 1);
        assert_eq!(clamped.size().0, 1);
        assert_eq!(clamped.size().1, MAX_SIDE);
    }

    #[test]
    fn test_frame_len_does_not_wrap() {
        assert_eq!(frame_len(40_000, 30_000), 4_800_000_000);
    }

    #[test]
    fn test_resize_then_dispose() {
        let mut raster = Raster::new(8, 8);
        raster.resize(16, 4);
        assert_eq!(raster.size(), (16, 4));
        assert_eq!(raster.pixels().len(), 16 * 4 * 4);
        raster.dispose();
        raster.dispose();
        assert!(raster.is_disposed());
        raster.clear(WHITE);
        raster.bloom(&BloomSettings::default());
        assert!(raster.pixels().is_empty());
    }
}
