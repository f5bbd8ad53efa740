use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use cosmoscope::render::raster::frame_len;

/// Video stream settings for the rawvideo pipe.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

pub struct FfmpegEncoder {
    child: Child,
    frame_len: usize,
    frames: u64,
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

/// Arguments muxing the piped frames with `audio` played back to back.
pub fn build_args(output_path: &Path, audio: &[PathBuf], settings: &EncoderSettings) -> Result<Vec<String>> {
    let mut args = vec![
        "-y".to_string(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height),
        "-framerate".into(), settings.fps.to_string(),
        "-i".into(), "pipe:0".into(),
    ];
    for input in audio {
        args.extend(["-i".to_string(), path_arg(input)?]);
    }

    args.extend(["-map".to_string(), "0:v".to_string()]);
    match audio.len() {
        0 => {}
        1 => args.extend(["-map".to_string(), "1:a".to_string()]),
        n => {
            let inputs: String = (1..=n).map(|i| format!("[{}:a]", i)).collect();
            args.extend([
                "-filter_complex".to_string(),
                format!("{}concat=n={}:v=0:a=1[aout]", inputs, n),
                "-map".to_string(),
                "[aout]".to_string(),
            ]);
        }
    }

    args.extend([
        "-c:v".into(), settings.codec.clone(),
        "-pix_fmt".into(), settings.pix_fmt.clone(),
    ]);
    if let Some(ref br) = settings.bitrate {
        args.extend(["-b:v".to_string(), br.clone()]);
    } else {
        args.extend(["-crf".to_string(), settings.crf.to_string()]);
        args.extend(["-preset".to_string(), "medium".to_string()]);
    }

    if !audio.is_empty() {
        args.extend([
            "-c:a".into(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
        ]);
    }
    args.push(path_arg(output_path)?);
    Ok(args)
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, audio: &[PathBuf], settings: &EncoderSettings) -> Result<Self> {
        let args = build_args(output_path, audio, settings)?;
        log::debug!("ffmpeg {}", args.join(" "));

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}, {} audio track(s)",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec,
            audio.len()
        );

        Ok(Self {
            child,
            frame_len: frame_len(settings.width, settings.height),
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_len {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_len
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // EOF on stdin ends the video stream
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete ({} frames)", self.frames);
        Ok(())
    }
}
