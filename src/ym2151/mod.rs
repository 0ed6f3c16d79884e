//! YM2151 FM Synthesis Domain
//!
//! Yamaha YM2151 (OPM) emulation: 8 channels of 4-operator FM with LFO, noise, timers
//! and the YM3012 serial DAC format.
//!
//! Implementation:
//! - `registers` - Address map and decoding of register writes
//! - `operator` / `envelope` - Per-slot phase and envelope generators
//! - `channel` - Algorithm routing and feedback
//! - `chip` - Master clock stepping, mixing and side outputs

// Internal modules
pub mod channel;
pub mod chip;
pub mod dac;
pub mod envelope;
pub mod lfo;
pub mod operator;
pub mod registers;
pub mod tables;
pub mod timer;

// Re-export public API
pub use channel::ChannelParams;
pub use chip::{
    ChipConfig, ClockOutput, SharedChip, SidebandFlags, StereoSample, Ym2151, CHANNEL_COUNT,
    CLOCKS_PER_SAMPLE, DEFAULT_CLOCK_HZ,
};
pub use envelope::{EnvelopeSnapshot, EnvelopeStage, MAX_ATTENUATION};
pub use lfo::LfoWaveform;
pub use operator::{OperatorId, OperatorParams};
pub use registers::{decode, RegisterBank, RegisterWrite, Slot};
pub use timer::TimerStatus;
