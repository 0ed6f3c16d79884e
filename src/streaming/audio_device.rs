//! Audio device integration using rodio
//!
//! Plays a [`ChipSource`] on the system audio device. rodio pulls samples from the
//! source on its own thread, so the chip is rendered inside the audio callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};

use super::source::ChipSource;
use crate::backend::ChipBackend;
use crate::{Result, Ym2151Error};

impl<C: ChipBackend> Source for ChipSource<C> {
    fn current_frame_len(&self) -> Option<usize> {
        // channel count and rate never change mid-stream
        None
    }

    fn channels(&self) -> u16 {
        ChipSource::channels(self)
    }

    fn sample_rate(&self) -> u32 {
        ChipSource::sample_rate(self)
    }

    fn total_duration(&self) -> Option<Duration> {
        self.frame_limit()
            .map(|frames| Duration::from_secs_f64(frames as f64 / ChipSource::sample_rate(self) as f64))
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start playing `source`
    ///
    /// # Arguments
    /// * `source` - Chip source; its channel count and sample rate define the stream format
    ///
    /// # Returns
    /// A new AudioDevice, or [`Ym2151Error::AudioDeviceError`] if no device could be opened.
    pub fn new<C: ChipBackend + 'static>(source: ChipSource<C>) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            Ym2151Error::AudioDeviceError(format!("Failed to create audio stream: {}", e))
        })?;

        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            Ym2151Error::AudioDeviceError(format!("Failed to create audio sink: {}", e))
        })?;

        let finished = source.finish_handle();
        log::info!(
            "Audio device opened ({} Hz, {} ch)",
            ChipSource::sample_rate(&source),
            ChipSource::channels(&source)
        );
        sink.append(source);

        Ok(AudioDevice {
            _stream: stream,
            sink,
            running: Arc::new(AtomicBool::new(true)),
            finished,
        })
    }

    /// Pause playback
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume playback
    pub fn play(&self) {
        self.sink.play();
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    /// Check if audio device is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Wait for playback to finish (blocks until the source ends)
    pub fn wait_for_finish(&self) {
        self.sink.sleep_until_end();
    }

    /// Stop the source at its next frame boundary
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finish();
        self.pause();
        self.running.store(false, Ordering::Relaxed);
    }
}
