use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, VizError};

/// Decoded mono PCM.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A resolved, playable audio resource handed over by the host.
#[derive(Clone, Debug)]
pub enum StreamHandle {
    Path(PathBuf),
    /// In-memory bytes, e.g. a file picked in a UI. `extension` is a probe hint.
    Blob {
        bytes: Vec<u8>,
        extension: Option<String>,
    },
}

impl StreamHandle {
    pub fn label(&self) -> String {
        match self {
            StreamHandle::Path(path) => path.display().to_string(),
            StreamHandle::Blob { bytes, extension } => match extension {
                Some(ext) => format!("blob ({} bytes, .{})", bytes.len(), ext),
                None => format!("blob ({} bytes)", bytes.len()),
            },
        }
    }
}

pub fn decode_stream(stream: &StreamHandle) -> Result<AudioData> {
    match stream {
        StreamHandle::Path(path) => decode_audio(path),
        StreamHandle::Blob { bytes, extension } => {
            let mut hint = Hint::new();
            if let Some(ext) = extension {
                hint.with_extension(ext);
            }
            decode_media(Box::new(Cursor::new(bytes.clone())), hint, &stream.label())
        }
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_media(Box::new(file), hint, &path.display().to_string())
}

fn decode_media(media: Box<dyn MediaSource>, hint: Hint, label: &str) -> Result<AudioData> {
    let mss = MediaSourceStream::new(media, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| VizError::UnsupportedMedia(format!("{label}: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VizError::UnsupportedMedia(format!("{label}: no audio tracks found")))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| VizError::UnsupportedMedia(format!("{label}: unknown sample rate")))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| VizError::UnsupportedMedia(format!("{label}: {e}")))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("{}: stopping decode early: {}", label, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("{}: skipping corrupt packet: {}", label, msg);
                continue;
            }
            Err(e) => {
                log::warn!("{}: stopping decode early: {}", label, e);
                break;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    if all_samples.is_empty() {
        return Err(VizError::UnsupportedMedia(format!("{label}: no decodable audio")));
    }

    log::info!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        label,
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_wav(frames: usize, sample_rate: u32, left: i16, right: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(left).unwrap();
                writer.write_sample(right).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_garbage_bytes_are_unsupported_media() {
        let stream = StreamHandle::Blob {
            bytes: b"definitely not audio".repeat(64),
            extension: None,
        };
        let err = decode_stream(&stream).unwrap_err();
        assert!(matches!(err, VizError::UnsupportedMedia(_)));
    }

    #[test]
    fn test_wav_blob_is_downmixed_to_mono() {
        let bytes = stereo_wav(8000, 8000, 16384, -16384);
        let stream = StreamHandle::Blob {
            bytes,
            extension: Some("wav".into()),
        };
        let audio = decode_stream(&stream).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.samples.len(), 8000);
        assert!((audio.duration() - 1.0).abs() < 1e-9);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = decode_audio(Path::new("/nonexistent/cosmoscope/track.mp3")).unwrap_err();
        assert!(matches!(err, VizError::Io(_)));
    }
}
