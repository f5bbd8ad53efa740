pub mod analyzer;
pub mod context;
pub mod decode;
pub mod source;

pub use analyzer::{AnalysisBuffer, AnalyzerConfig, BufferKind, FrameBuffers, SpectralAnalyzer};
pub use context::{AudioContext, AutoplayPolicy, ContextState, TapId};
pub use decode::{AudioData, StreamHandle};
pub use source::{PlaybackEvent, PlaybackState, SignalSource, SourceId};
