//! WAV file export functionality

use std::io::{Seek, Write};
use std::path::Path;

use super::{apply_fade_out, ExportConfig};
use crate::program::RegisterProgram;
use crate::render::{render_program, RenderedAudio};
use crate::{Result, Ym2151Error};

/// Render a register program and write it to a WAV file
///
/// Returns the rendered audio so a failed write can be retried with [`write_wav`]
/// without rendering again.
///
/// # Arguments
///
/// * `program` - Register program to play from a freshly reset chip
/// * `output_path` - Path where the WAV file will be written
/// * `config` - Export configuration (sample rate, channels, length, fade)
///
/// # Examples
///
/// ```no_run
/// use ym2151::export::{export_program_to_wav, ExportConfig};
/// use ym2151::RegisterProgram;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let program = RegisterProgram::key_toggle(0x4A, 500.0, 4_000.0);
/// let config = ExportConfig::mono().duration(4.0).fade_out(0.25);
/// export_program_to_wav(&program, "toggle.wav", &config)?;
/// # Ok(())
/// # }
/// ```
pub fn export_program_to_wav<P: AsRef<Path>>(
    program: &RegisterProgram,
    output_path: P,
    config: &ExportConfig,
) -> Result<RenderedAudio> {
    let audio = render_program(program, &config.render_config())?;
    let audio = if config.fade_out_secs > 0.0 {
        log::debug!("Applying {:.2}s fade out", config.fade_out_secs);
        let mut samples = audio.into_samples();
        apply_fade_out(
            &mut samples,
            config.channels,
            config.fade_out_secs,
            config.sample_rate,
        );
        RenderedAudio::new(samples, config.sample_rate, config.channels)
    } else {
        audio
    };

    write_wav(&audio, output_path)?;
    Ok(audio)
}

/// Write rendered audio to a WAV file (16-bit PCM)
pub fn write_wav<P: AsRef<Path>>(audio: &RenderedAudio, path: P) -> Result<()> {
    let path = path.as_ref();
    log::info!("Writing WAV file to {}", path.display());
    let writer = hound::WavWriter::create(path, wav_spec(audio))
        .map_err(|e| Ym2151Error::AudioFileError(format!("Failed to create WAV file: {}", e)))?;
    write_samples(writer, audio)?;
    log::info!("Export complete ({} frames)", audio.frames());
    Ok(())
}

/// Write rendered audio as a WAV stream into any seekable writer
pub fn write_wav_to<W: Write + Seek>(audio: &RenderedAudio, writer: W) -> Result<()> {
    let writer = hound::WavWriter::new(writer, wav_spec(audio))
        .map_err(|e| Ym2151Error::AudioFileError(format!("Failed to start WAV stream: {}", e)))?;
    write_samples(writer, audio)
}

fn wav_spec(audio: &RenderedAudio) -> hound::WavSpec {
    hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(mut writer: hound::WavWriter<W>, audio: &RenderedAudio) -> Result<()> {
    for &sample in audio.samples() {
        writer
            .write_sample(sample)
            .map_err(|e| Ym2151Error::AudioFileError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| Ym2151Error::AudioFileError(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_canonical_header() {
        let audio = RenderedAudio::new(vec![0, 1, -1, 2, -2, 3], 48_000, 2);
        let mut cursor = Cursor::new(Vec::new());
        write_wav_to(&audio, &mut cursor).unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u16_at(&bytes, 20), 1); // PCM
        assert_eq!(u16_at(&bytes, 22), 2); // channels
        assert_eq!(u32_at(&bytes, 24), 48_000);
        assert_eq!(u32_at(&bytes, 28), 48_000 * 2 * 2); // byte rate
        assert_eq!(u16_at(&bytes, 32), 4); // block align
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 3 * 2 * 2);
        assert_eq!(bytes.len(), 44 + 12);
    }

    #[test]
    fn test_write_failure_keeps_buffer() {
        let audio = RenderedAudio::new(vec![100; 64], 8_000, 1);
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("out.wav");

        let err = write_wav(&audio, &missing).unwrap_err();
        assert!(matches!(err, Ym2151Error::AudioFileError(_)));

        // retry with the same buffer
        let path = dir.path().join("out.wav");
        write_wav(&audio, &path).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 64);
    }
}
