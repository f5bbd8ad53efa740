use glam::Vec2;

use super::canvas::{BloomSettings, Canvas, ColorStop, Fill, Rgba};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCmd {
    Clear(Rgba),
    Polyline {
        points: Vec<Vec2>,
        width: f32,
        color: Rgba,
    },
    FillRect {
        origin: Vec2,
        size: Vec2,
        fill: RecordedFill,
    },
    FillCircle {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
    FillTriangle {
        points: [Vec2; 3],
        color: Rgba,
    },
    Bloom(BloomSettings),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedFill {
    Solid(Rgba),
    LinearGradient {
        from: Vec2,
        to: Vec2,
        stops: Vec<ColorStop>,
    },
}

impl From<&Fill<'_>> for RecordedFill {
    fn from(fill: &Fill<'_>) -> Self {
        match *fill {
            Fill::Solid(color) => RecordedFill::Solid(color),
            Fill::LinearGradient { from, to, stops } => RecordedFill::LinearGradient {
                from,
                to,
                stops: stops.to_vec(),
            },
        }
    }
}

/// Surface that records draw commands instead of rasterizing them.
///
/// `clear` starts a new frame, so after a render the list holds exactly that
/// frame's commands.
#[derive(Debug)]
pub struct DisplayList {
    width: u32,
    height: u32,
    commands: Vec<DrawCmd>,
    frames: u64,
    disposed: bool,
}

impl DisplayList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            frames: 0,
            disposed: false,
        }
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.commands
    }

    /// Number of `clear` calls seen, i.e. frames started.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn polylines(&self) -> impl Iterator<Item = (&[Vec2], f32, Rgba)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCmd::Polyline { points, width, color } => Some((points.as_slice(), *width, *color)),
            _ => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCmd::FillRect { origin, size, .. } => Some((*origin, *size)),
            _ => None,
        })
    }

    fn record(&mut self, cmd: DrawCmd) {
        if !self.disposed {
            self.commands.push(cmd);
        }
    }
}

impl Canvas for DisplayList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.disposed {
            return;
        }
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self, color: Rgba) {
        if self.disposed {
            return;
        }
        self.commands.clear();
        self.frames += 1;
        self.commands.push(DrawCmd::Clear(color));
    }

    fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        self.record(DrawCmd::Polyline {
            points: points.to_vec(),
            width,
            color,
        });
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, fill: &Fill<'_>) {
        self.record(DrawCmd::FillRect {
            origin,
            size,
            fill: fill.into(),
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.record(DrawCmd::FillCircle { center, radius, color });
    }

    fn fill_triangle(&mut self, points: [Vec2; 3], color: Rgba) {
        self.record(DrawCmd::FillTriangle { points, color });
    }

    fn bloom(&mut self, settings: &BloomSettings) {
        self.record(DrawCmd::Bloom(*settings));
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.commands.clear();
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}
