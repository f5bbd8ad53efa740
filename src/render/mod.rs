pub mod bars;
pub mod bloom;
pub mod canvas;
pub mod circular;
pub mod display_list;
pub mod gpu;
pub mod postprocess;
pub mod procedural;
pub mod raster;
pub mod waveform;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::mapper::VisualParameters;
pub use bars::{BarsStrategy, BarsStyle};
pub use canvas::{BloomSettings, Canvas, ColorStop, Fill, Rgba};
pub use circular::{CircularStrategy, CircularStyle};
pub use display_list::{DisplayList, DrawCmd};
pub use procedural::{ProceduralStrategy, SceneConfig};
pub use raster::Raster;
pub use waveform::{WaveformStrategy, WaveformStyle};

/// Which visual algorithm the next frame runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Waveform,
    Bars,
    Circular,
    Procedural3d,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Waveform, Mode::Bars, Mode::Circular, Mode::Procedural3d];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Waveform => "waveform",
            Mode::Bars => "bars",
            Mode::Circular => "circular",
            Mode::Procedural3d => "procedural3d",
        }
    }

    /// Only the waveform trace needs the time-domain buffer.
    pub fn uses_waveform(&self) -> bool {
        matches!(self, Mode::Waveform)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waveform" => Ok(Mode::Waveform),
            "bars" | "frequency" => Ok(Mode::Bars),
            "circular" => Ok(Mode::Circular),
            "procedural3d" | "procedural" | "3d" => Ok(Mode::Procedural3d),
            other => Err(format!(
                "unknown mode '{other}', expected one of: waveform, bars, circular, procedural3d"
            )),
        }
    }
}

/// Everything a strategy may read for one frame.
///
/// The byte buffers borrow the analyzer's storage and are only valid for this frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Time-domain bytes; empty unless the mode asked for them.
    pub waveform: &'a [u8],
    /// Frequency-domain bytes.
    pub spectrum: &'a [u8],
    pub params: &'a VisualParameters,
    /// Seconds since the visualizer was created.
    pub time: f32,
}

/// One visual algorithm. Implementations hold configuration only, never per-frame state.
pub trait RenderStrategy {
    fn name(&self) -> &'static str;

    fn render(&self, canvas: &mut dyn Canvas, frame: &Frame<'_>);
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub waveform: WaveformStyle,
    pub bars: BarsStyle,
    pub circular: CircularStyle,
    pub scene: SceneConfig,
    pub bloom: BloomSettings,
}

/// The four strategies, built once and selected per frame.
pub struct Strategies {
    waveform: WaveformStrategy,
    bars: BarsStrategy,
    circular: CircularStrategy,
    procedural: ProceduralStrategy,
}

impl Strategies {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            waveform: WaveformStrategy::new(config.waveform),
            bars: BarsStrategy::new(config.bars),
            circular: CircularStrategy::new(config.circular),
            procedural: ProceduralStrategy::new(config.scene, config.bloom),
        }
    }

    pub fn get(&self, mode: Mode) -> &dyn RenderStrategy {
        match mode {
            Mode::Waveform => &self.waveform,
            Mode::Bars => &self.bars,
            Mode::Circular => &self.circular,
            Mode::Procedural3d => &self.procedural,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>(), Ok(mode));
        }
        assert_eq!("Procedural".parse::<Mode>(), Ok(Mode::Procedural3d));
        assert!("spiral".parse::<Mode>().is_err());
    }

    #[test]
    fn test_strategy_lookup() {
        let strategies = Strategies::new(&RenderConfig::default());
        for mode in Mode::ALL {
            assert_eq!(strategies.get(mode).name(), mode.as_str());
        }
    }
}
