use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cosmoscope", about = "Audio-reactive visualizer that renders playback to video")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC), played back to back
    pub inputs: Vec<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Visualization mode: waveform, bars, circular, procedural3d, or all
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Video width in pixels [default: 1280]
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels [default: 720]
    #[arg(long)]
    pub height: Option<u32>,

    /// Frames per second, the simulated display refresh rate [default: 60]
    #[arg(long)]
    pub fps: Option<u32>,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long)]
    pub crf: Option<u32>,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec [default: libx264]
    #[arg(long)]
    pub codec: Option<String>,

    /// FFmpeg pixel format [default: yuv420p]
    #[arg(long)]
    pub pix_fmt: Option<String>,

    /// Analysis frame size for every mode (power of two, 32-32768)
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Multiplier applied to raw energy before mapping to visuals
    #[arg(long)]
    pub amplification: Option<f32>,

    /// Spectrum smoothing time constant (0.0-1.0)
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Seconds per mode when cycling with --mode all
    #[arg(long)]
    pub cycle_secs: Option<f32>,

    /// Run the bloom pass on the CPU instead of the GPU
    #[arg(long)]
    pub cpu_bloom: bool,

    /// Config file (defaults to ./cosmoscope.toml or ~/.config/cosmoscope/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List available visualization modes and exit
    #[arg(long)]
    pub list_modes: bool,
}
