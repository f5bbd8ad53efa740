//! Audio-reactive visualization core.
//!
//! A [`visualizer::Visualizer`] pulls a waveform and spectrum from the current
//! [`audio::SignalSource`] once per display frame, folds them into smoothed
//! [`mapper::VisualParameters`] and hands both to the active
//! [`render::RenderStrategy`], which draws onto a [`render::Canvas`].

pub mod audio;
pub mod config;
pub mod error;
pub mod mapper;
pub mod render;
pub mod scheduler;
pub mod visualizer;

pub use error::{Result, VizError};
pub use render::Mode;
pub use visualizer::{FrameOutcome, Visualizer, VisualizerConfig};
