//! YM2151 (OPM) FM Synthesis Emulator
//!
//! A sample-accurate emulator of the Yamaha YM2151 FM operator chip. It provides
//! eight 4-operator FM channels, an LFO, a noise generator, timers A/B with CSM, and
//! the YM3012 serial DAC format. The chip is clocked one master cycle at a time, and a
//! drift-free clock bridge turns its native rate into any output sample rate.
//!
//! # Features
//! - Per-cycle chip stepping with serial DAC side outputs (SO, SH1, SH2, IRQ, CT1/CT2)
//! - All 8 connection algorithms with operator 1 self-feedback
//! - Attack/decay/sustain/release envelopes with key scaling
//! - Integer clock bridge (no cumulative drift at any rate ratio)
//! - JSON register programs and built-in demo programs
//! - Offline rendering and WAV export
//! - Pull-driven streaming with lock-free register handoff
//!
//! # Crate feature flags
//! - `export-wav` (default): WAV export of rendered audio (enables `hound`)
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Core emulator only
//! ```
//! use ym2151::{ChipBackend, Ym2151};
//! let mut chip = Ym2151::new();
//! chip.write_register(0x20, 0xC7); // L+R, algorithm 7
//! chip.write_register(0x28, 0x4A); // A4
//! chip.write_register(0x08, 0x78); // key on M1, C1, M2, C2
//! let out = chip.clock_step();
//! let _sample = out.sample();
//! ```
//!
//! ## Render a program
//! ```
//! use ym2151::{render_program, RegisterProgram, RenderConfig};
//! let program = RegisterProgram::key_toggle(0x4D, 100.0, 200.0);
//! let audio = render_program(&program, &RenderConfig::stereo(48_000, 0.2)).unwrap();
//! assert_eq!(audio.frames(), 9_600);
//! ```
//!
//! ## Real-time streaming
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use ym2151::{AudioDevice, ChipSource, RegisterProgram, StreamConfig};
//! let cfg = StreamConfig::low_latency(48_000);
//! let source = ChipSource::for_program(&RegisterProgram::tone(0x4D), &cfg).unwrap();
//! let device = AudioDevice::new(source).unwrap();
//! device.wait_for_finish();
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend; // Chip backend abstraction
pub mod export; // File Export
pub mod program; // Register programs & scheduling
pub mod render; // Offline rendering
pub mod resampler; // Clock bridge
pub mod streaming; // Audio Output & Streaming
pub mod ym2151; // YM2151 FM Emulation (core)

/// Error types for YM2151 emulator operations
#[derive(thiserror::Error, Debug)]
pub enum Ym2151Error {
    /// Invalid register program (bad JSON, out-of-order or negative times)
    #[error("Program error: {0}")]
    ProgramError(String),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The register queue rejected a write because it was full
    #[error("Register queue full")]
    QueueFull,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Ym2151Error {
    /// Converts a String into `Ym2151Error::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `ProgramError`, ...) where the
    /// cause is known.
    fn from(msg: String) -> Self {
        Ym2151Error::Other(msg)
    }
}

impl From<&str> for Ym2151Error {
    /// Converts a string slice into `Ym2151Error::Other`.
    fn from(msg: &str) -> Self {
        Ym2151Error::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, Ym2151Error>;

// Public API exports
pub use backend::ChipBackend;
pub use program::{ProgramEvent, RegisterProgram, Sequencer};
pub use render::{render_program, RenderConfig, RenderedAudio, Renderer};
pub use resampler::ClockBridge;
#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
pub use streaming::{register_queue, ChipSource, RegisterQueue, StreamConfig};
pub use ym2151::{
    ChipConfig, ClockOutput, SharedChip, SidebandFlags, StereoSample, Ym2151,
};
