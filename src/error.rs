use thiserror::Error;

/// Errors surfaced by the visualizer core.
///
/// Analysis errors and disposal errors never appear here: the analyzer
/// degrades to a silent buffer and disposal is idempotent.
#[derive(Error, Debug)]
pub enum VizError {
    /// The stream could not be probed or decoded. Nothing was replaced.
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// The host refused to start playback until a user gesture is granted.
    #[error("playback blocked by autoplay policy, retry play() after a user gesture")]
    PlaybackBlocked,

    #[error("no audio source loaded")]
    NoSource,

    #[error("visualizer has been torn down")]
    Disposed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VizError>;
