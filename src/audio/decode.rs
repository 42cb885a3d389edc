//! In-memory decoding of result audio with `symphonia`.
//!
//! Job results arrive as encoded bytes (WAV, MP3, FLAC, Ogg Vorbis).  They are
//! decoded straight from memory and downmixed to a mono [`AudioClip`].

use std::io::{Cursor, ErrorKind};

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use thiserror::Error;

use super::{downmix, AudioClip};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognised audio container: {0}")]
    Probe(String),

    #[error("audio contains no decodable track")]
    NoTrack,

    #[error("audio track has no sample rate")]
    MissingSampleRate,

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio produced no samples")]
    Empty,
}

/// Decode `bytes` into a mono clip.  `format_hint` is a file extension such
/// as `"mp3"` or `"wav"` when the sender provided one.
pub fn decode_clip(bytes: &[u8], format_hint: Option<&str>) -> Result<AudioClip, DecodeError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format_hint {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(DecodeError::Decode(err.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                let channels = spec.channels.count();
                if channels == 0 {
                    continue;
                }
                let mut samples = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                samples.copy_interleaved_ref(buffer);
                mono.extend(downmix(samples.samples(), channels));
            }
            Err(SymphoniaError::DecodeError(err)) => {
                log::debug!("decode: skipping corrupt packet: {err}");
            }
            Err(err) => return Err(DecodeError::Decode(err.to_string())),
        }
    }

    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(AudioClip::new(mono, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_wav;

    #[test]
    fn decodes_wav_bytes_to_mono() {
        // Stereo: left 0.5, right -0.25 → mono 0.125
        let interleaved: Vec<i16> = (0..800)
            .flat_map(|_| [i16::MAX / 2, i16::MIN / 4])
            .collect();
        let bytes = encode_wav(&interleaved, 2, 8_000).unwrap();

        let clip = decode_clip(&bytes, Some("wav")).unwrap();
        assert_eq!(clip.sample_rate, 8_000);
        assert_eq!(clip.samples.len(), 800);
        assert!((clip.samples[0] - 0.125).abs() < 1e-3, "{}", clip.samples[0]);
    }

    #[test]
    fn decodes_without_hint() {
        let bytes = encode_wav(&vec![1_000_i16; 160], 1, 16_000).unwrap();
        let clip = decode_clip(&bytes, None).unwrap();
        assert_eq!(clip.samples.len(), 160);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_clip(b"definitely not audio", Some("mp3")).is_err());
        assert!(decode_clip(&[], None).is_err());
    }
}
