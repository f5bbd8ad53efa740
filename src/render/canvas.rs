use glam::Vec2;
use serde::Deserialize;

/// Linear RGBA colour, channels in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// `0xRRGGBB`.
    pub fn hex(rgb: u32) -> Self {
        let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
        Self::rgb(channel(16), channel(8), channel(0))
    }

    /// Hue in degrees, saturation and lightness in [0, 1].
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);
        if s == 0.0 {
            return Self::rgb(l, l, l);
        }
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f32| {
            let t = t.rem_euclid(1.0);
            if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            }
        };
        Self::rgb(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
            a: self.a,
        }
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Rgba,
}

impl ColorStop {
    pub const fn new(offset: f32, color: Rgba) -> Self {
        Self { offset, color }
    }
}

/// Colour at `t` along sorted gradient stops.
pub fn sample_stops(stops: &[ColorStop], t: f32) -> Rgba {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Rgba::TRANSPARENT,
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.color;
            }
            return a.color.lerp(b.color, (t - a.offset) / span);
        }
    }
    last.color
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fill<'a> {
    Solid(Rgba),
    /// Canvas-style linear gradient; `t` is the projection onto `from -> to`.
    LinearGradient {
        from: Vec2,
        to: Vec2,
        stops: &'a [ColorStop],
    },
}

impl Fill<'_> {
    pub fn color_at(&self, point: Vec2) -> Rgba {
        match *self {
            Fill::Solid(color) => color,
            Fill::LinearGradient { from, to, stops } => {
                let axis = to - from;
                let len2 = axis.length_squared();
                let t = if len2 > f32::EPSILON { (point - from).dot(axis) / len2 } else { 0.0 };
                sample_stops(stops, t)
            }
        }
    }
}

/// Bright-pass threshold, additive strength and blur radius of the glow pass.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub threshold: f32,
    pub strength: f32,
    pub radius: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            strength: 0.4,
            radius: 4,
        }
    }
}

/// A drawing target sized to the viewport.
///
/// Every operation on a disposed canvas is a no-op.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self, color: Rgba);

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba);

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) {
        self.stroke_polyline(&[from, to], width, color);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, fill: &Fill<'_>);

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba);

    fn fill_triangle(&mut self, points: [Vec2; 3], color: Rgba);

    /// Post-process glow over everything drawn so far.
    fn bloom(&mut self, settings: &BloomSettings);

    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}
