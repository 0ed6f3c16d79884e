//! YM2151 (OPM) chip core
//!
//! The chip is advanced one master clock cycle at a time with [`Ym2151::clock_step`].
//! Every 64 master cycles it runs one full native sample: timers, LFO and noise,
//! envelopes and phases of all 32 operators, channel mixing and DAC quantization. The
//! resulting stereo sample is held on the outputs until the next one is ready, while
//! the serial DAC line shifts it out bit by bit.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use super::channel::{Channel, ChannelParams};
use super::dac;
use super::envelope::EnvelopeSnapshot;
use super::lfo::{Lfo, Noise};
use super::operator::{OperatorId, OperatorParams};
use super::registers::{decode, RegisterBank, RegisterWrite, Slot};
use super::timer::{TimerStatus, Timers};
use crate::backend::ChipBackend;
use crate::{Result, Ym2151Error};

/// NTSC colour burst clock used by most YM2151 boards.
pub const DEFAULT_CLOCK_HZ: u32 = 3_579_545;

/// Master clock cycles per native sample.
pub const CLOCKS_PER_SAMPLE: u32 = 64;

/// Number of FM channels.
pub const CHANNEL_COUNT: usize = 8;

/// Channel whose last operator can be replaced by noise.
const NOISE_CHANNEL: usize = 7;

bitflags! {
    /// Digital side outputs of the chip for one master cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct SidebandFlags: u8 {
        /// Left sample-and-hold strobe (last cycle of the left serial word)
        const SH1 = 0x01;
        /// Right sample-and-hold strobe (last cycle of the right serial word)
        const SH2 = 0x02;
        /// Serial DAC data line
        const SO = 0x04;
        /// Timer interrupt line
        const IRQ = 0x08;
        /// General purpose output CT1
        const CT1 = 0x10;
        /// General purpose output CT2
        const CT2 = 0x20;
    }
}

/// One stereo sample in signed 16-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StereoSample {
    /// Left channel
    pub left: i16,
    /// Right channel
    pub right: i16,
}

impl StereoSample {
    /// Digital silence
    pub const SILENCE: StereoSample = StereoSample { left: 0, right: 0 };

    /// Average of both sides
    pub fn mono(&self) -> i16 {
        ((self.left as i32 + self.right as i32) / 2) as i16
    }
}

/// Result of one master clock cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockOutput {
    /// Held left output
    pub left: i16,
    /// Held right output
    pub right: i16,
    /// Side outputs during this cycle
    pub flags: SidebandFlags,
}

impl ClockOutput {
    /// The held stereo sample
    pub fn sample(&self) -> StereoSample {
        StereoSample {
            left: self.left,
            right: self.right,
        }
    }
}

/// Static chip configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipConfig {
    /// Master clock in Hz
    pub clock_hz: u32,
}

impl ChipConfig {
    /// Configuration with a custom master clock
    pub fn with_clock(clock_hz: u32) -> Self {
        Self { clock_hz }
    }

    /// Native sample rate (master clock / 64)
    pub fn native_sample_rate(&self) -> f64 {
        self.clock_hz as f64 / CLOCKS_PER_SAMPLE as f64
    }

    /// Reject a zero clock.
    pub fn validate(&self) -> Result<()> {
        if self.clock_hz == 0 {
            return Err(Ym2151Error::ConfigError(
                "chip clock must be greater than 0 Hz".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self::with_clock(DEFAULT_CLOCK_HZ)
    }
}

/// A chip shared between a control thread and a render thread.
pub type SharedChip = Arc<Mutex<Ym2151>>;

/// YM2151 FM synthesizer.
#[derive(Clone)]
pub struct Ym2151 {
    clock_hz: u32,
    registers: RegisterBank,
    channels: [Channel; CHANNEL_COUNT],
    lfo: Lfo,
    noise: Noise,
    timers: Timers,
    csm_active: bool,
    ct1: bool,
    ct2: bool,
    /// Master cycle within the current 64-cycle frame
    cycle: u32,
    env_counter: u32,
    frame_count: u64,
    output: StereoSample,
    /// Serial DAC words for left and right
    serial: [u16; 2],
    muted: [bool; CHANNEL_COUNT],
}

impl Ym2151 {
    /// Create a chip clocked at [`DEFAULT_CLOCK_HZ`].
    pub fn new() -> Self {
        Self::with_config(ChipConfig::default())
    }

    /// Create a chip with an explicit configuration.
    pub fn with_config(config: ChipConfig) -> Self {
        Self {
            clock_hz: config.clock_hz,
            registers: RegisterBank::new(),
            channels: std::array::from_fn(|_| Channel::new()),
            lfo: Lfo::new(),
            noise: Noise::new(),
            timers: Timers::new(),
            csm_active: false,
            ct1: false,
            ct2: false,
            cycle: 0,
            env_counter: 0,
            frame_count: 0,
            output: StereoSample::SILENCE,
            serial: [dac::encode(0); 2],
            muted: [false; CHANNEL_COUNT],
        }
    }

    /// Wrap the chip for use from several threads.
    pub fn into_shared(self) -> SharedChip {
        Arc::new(Mutex::new(self))
    }

    /// Return every register, operator and counter to its power-on value.
    ///
    /// Channel mutes are a host setting and survive the reset.
    pub fn reset(&mut self) {
        log::debug!("YM2151 reset ({} Hz)", self.clock_hz);
        let muted = self.muted;
        *self = Self::with_config(ChipConfig::with_clock(self.clock_hz));
        self.muted = muted;
    }

    /// Write a register. Unmapped addresses are ignored.
    pub fn write(&mut self, address: u8, value: u8) {
        let Some(update) = decode(address, value) else {
            return;
        };
        self.registers.write(address, value);
        self.apply(update);
    }

    fn apply(&mut self, update: RegisterWrite) {
        match update {
            RegisterWrite::Test { lfo_reset } => self.lfo.set_held(lfo_reset),
            RegisterWrite::KeyOn {
                channel,
                operators,
            } => self.channels[channel as usize & 7].set_keys(operators),
            RegisterWrite::Noise { enabled, frequency } => {
                self.noise.configure(enabled, frequency)
            }
            RegisterWrite::TimerAHigh(value) => self.timers.set_period_a_high(value),
            RegisterWrite::TimerALow(value) => self.timers.set_period_a_low(value),
            RegisterWrite::TimerB(value) => self.timers.set_period_b(value),
            RegisterWrite::TimerControl(value) => self.timers.write_control(value),
            RegisterWrite::LfoFrequency(value) => self.lfo.set_frequency(value),
            RegisterWrite::LfoDepth { pitch, depth } => {
                if pitch {
                    self.lfo.set_pm_depth(depth);
                } else {
                    self.lfo.set_am_depth(depth);
                }
            }
            RegisterWrite::ControlWaveform { ct1, ct2, waveform } => {
                self.ct1 = ct1;
                self.ct2 = ct2;
                self.lfo.set_waveform(waveform);
            }
            RegisterWrite::Routing {
                channel,
                right,
                left,
                feedback,
                algorithm,
            } => self.update_channel(channel, |p| {
                p.right = right;
                p.left = left;
                p.feedback = feedback;
                p.algorithm = algorithm;
            }),
            RegisterWrite::KeyCode { channel, code } => {
                self.update_channel(channel, |p| p.key_code = code)
            }
            RegisterWrite::KeyFraction { channel, fraction } => {
                self.update_channel(channel, |p| p.key_fraction = fraction)
            }
            RegisterWrite::Sensitivity { channel, pms, ams } => {
                self.update_channel(channel, |p| {
                    p.pm_sensitivity = pms;
                    p.am_sensitivity = ams;
                })
            }
            RegisterWrite::DetuneMultiple {
                slot,
                detune1,
                multiple,
            } => self.update_operator(slot, |p| {
                p.detune1 = detune1;
                p.multiple = multiple;
            }),
            RegisterWrite::TotalLevel { slot, level } => {
                self.update_operator(slot, |p| p.total_level = level)
            }
            RegisterWrite::KeyScaleAttack {
                slot,
                key_scale,
                attack_rate,
            } => self.update_operator(slot, |p| {
                p.key_scale = key_scale;
                p.attack_rate = attack_rate;
            }),
            RegisterWrite::AmDecay1 {
                slot,
                am_enable,
                decay1_rate,
            } => self.update_operator(slot, |p| {
                p.am_enable = am_enable;
                p.decay1_rate = decay1_rate;
            }),
            RegisterWrite::Detune2Decay2 {
                slot,
                detune2,
                decay2_rate,
            } => self.update_operator(slot, |p| {
                p.detune2 = detune2;
                p.decay2_rate = decay2_rate;
            }),
            RegisterWrite::Decay1LevelRelease {
                slot,
                decay1_level,
                release_rate,
            } => self.update_operator(slot, |p| {
                p.decay1_level = decay1_level;
                p.release_rate = release_rate;
            }),
        }
    }

    fn update_channel(&mut self, channel: u8, update: impl FnOnce(&mut ChannelParams)) {
        let channel = &mut self.channels[channel as usize & 7];
        let mut params = *channel.params();
        update(&mut params);
        channel.set_params(params);
    }

    fn update_operator(&mut self, slot: Slot, update: impl FnOnce(&mut OperatorParams)) {
        let channel = &mut self.channels[slot.channel as usize & 7];
        let mut params = *channel.operator(slot.operator).params();
        update(&mut params);
        channel.set_operator_params(slot.operator, params);
    }

    /// Advance one master clock cycle.
    pub fn clock_step(&mut self) -> ClockOutput {
        if self.cycle == 0 {
            self.run_frame();
        }

        let mut flags = SidebandFlags::empty();
        let word = self.serial[(self.cycle >> 5) as usize];
        if (word >> ((self.cycle >> 1) & 15)) & 1 != 0 {
            flags |= SidebandFlags::SO;
        }
        match self.cycle {
            31 => flags |= SidebandFlags::SH1,
            63 => flags |= SidebandFlags::SH2,
            _ => {}
        }
        flags.set(SidebandFlags::IRQ, self.timers.irq());
        flags.set(SidebandFlags::CT1, self.ct1);
        flags.set(SidebandFlags::CT2, self.ct2);

        self.cycle = (self.cycle + 1) % CLOCKS_PER_SAMPLE;

        ClockOutput {
            left: self.output.left,
            right: self.output.right,
            flags,
        }
    }

    /// One native sample of engine work.
    fn run_frame(&mut self) {
        // CSM key-on lasts a single sample
        if self.csm_active {
            self.channels.iter_mut().for_each(|ch| ch.set_csm_keys(false));
            self.csm_active = false;
        }
        if self.timers.clock() {
            self.channels.iter_mut().for_each(|ch| ch.set_csm_keys(true));
            self.csm_active = true;
        }

        self.noise.clock();
        let raw_pm = self.lfo.clock(&self.noise);
        let lfo_am = self.lfo.am();

        // envelope runs on two of every three increments
        self.env_counter = self.env_counter.wrapping_add(1);
        if self.env_counter & 3 == 3 {
            self.env_counter = self.env_counter.wrapping_add(1);
        }
        let env_tick = (self.env_counter & 3 == 0).then_some(self.env_counter >> 2);

        let noise = self.noise.enabled().then_some(self.noise.state());
        let (mut left, mut right) = (0i32, 0i32);
        for (index, channel) in self.channels.iter_mut().enumerate() {
            channel.clock(env_tick, raw_pm);
            let value = channel.output(lfo_am, if index == NOISE_CHANNEL { noise } else { None });
            if self.muted[index] {
                continue;
            }
            let params = channel.params();
            if params.left {
                left += value;
            }
            if params.right {
                right += value;
            }
        }

        self.output = StereoSample {
            left: dac::quantize(left),
            right: dac::quantize(right),
        };
        self.serial = [dac::encode(left), dac::encode(right)];
        self.frame_count += 1;
    }

    /// Latched stereo output
    pub fn output(&self) -> StereoSample {
        self.output
    }

    /// Timer flags
    pub fn status(&self) -> TimerStatus {
        self.timers.status()
    }

    /// Master clock in Hz
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Native sample rate in Hz
    pub fn native_sample_rate(&self) -> f64 {
        ChipConfig::with_clock(self.clock_hz).native_sample_rate()
    }

    /// Native samples computed since power-on or reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Last value written to a mapped register (0 if never written)
    pub fn register(&self, address: u8) -> u8 {
        self.registers.read(address)
    }

    /// Decoded parameters of a channel
    pub fn channel_params(&self, channel: usize) -> Option<&ChannelParams> {
        self.channels.get(channel).map(Channel::params)
    }

    /// Decoded parameters of one operator
    pub fn operator_params(&self, channel: usize, operator: OperatorId) -> Option<&OperatorParams> {
        self.channels
            .get(channel)
            .map(|ch| ch.operator(operator).params())
    }

    /// Envelope stage and attenuation of one operator
    pub fn envelope(&self, channel: usize, operator: OperatorId) -> Option<EnvelopeSnapshot> {
        self.channels
            .get(channel)
            .map(|ch| ch.operator(operator).envelope())
    }

    /// Mute or unmute a channel in the mix (the channel keeps running)
    pub fn set_channel_mute(&mut self, channel: usize, mute: bool) {
        if let Some(m) = self.muted.get_mut(channel) {
            *m = mute;
        }
    }

    /// Whether a channel is muted
    pub fn is_channel_muted(&self, channel: usize) -> bool {
        self.muted.get(channel).copied().unwrap_or(false)
    }
}

impl Default for Ym2151 {
    fn default() -> Self {
        Self::new()
    }
}

impl ChipBackend for Ym2151 {
    fn reset(&mut self) {
        Ym2151::reset(self)
    }

    fn write_register(&mut self, address: u8, value: u8) {
        self.write(address, value)
    }

    fn clock_step(&mut self) -> ClockOutput {
        Ym2151::clock_step(self)
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }
}

impl std::fmt::Debug for Ym2151 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ym2151")
            .field("clock_hz", &self.clock_hz)
            .field("frame_count", &self.frame_count)
            .field("cycle", &self.cycle)
            .field("output", &self.output)
            .field("status", &self.timers.status())
            .finish()
    }
}
