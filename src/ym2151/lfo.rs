//! Low-frequency oscillator and noise generator
//!
//! The LFO produces one amplitude (AM) and one pitch (PM) modulation value per native
//! sample, shared by all channels; each channel scales them by its own sensitivities.
//! The noise generator is a 17-bit LFSR whose output replaces channel 7's last operator
//! when enabled, and which also feeds the LFO's noise waveform.

/// LFO waveform selected by register 0x1B bits 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LfoWaveform {
    /// Sawtooth (AM falls while PM rises)
    #[default]
    Saw,
    /// Square
    Square,
    /// Triangle
    Triangle,
    /// Sample-and-hold noise
    Noise,
}

impl LfoWaveform {
    /// Decode the two waveform bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => LfoWaveform::Saw,
            1 => LfoWaveform::Square,
            2 => LfoWaveform::Triangle,
            _ => LfoWaveform::Noise,
        }
    }
}

/// Global LFO.
#[derive(Debug, Clone, Default)]
pub struct Lfo {
    counter: u32,
    frequency: u8,
    waveform: LfoWaveform,
    am_depth: u8,
    pm_depth: u8,
    held: bool,
    /// Last 8-bit position, used to latch the noise waveform
    position: u32,
    noise_sample: u32,
    am: u32,
}

impl Lfo {
    /// LFO at power-on
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the 8-bit frequency register.
    pub fn set_frequency(&mut self, frequency: u8) {
        self.frequency = frequency;
    }

    /// Set the waveform.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Set the 7-bit AM depth.
    pub fn set_am_depth(&mut self, depth: u8) {
        self.am_depth = depth & 0x7f;
    }

    /// Set the 7-bit PM depth.
    pub fn set_pm_depth(&mut self, depth: u8) {
        self.pm_depth = depth & 0x7f;
    }

    /// Hold the counter at zero while set (test register bit 1).
    pub fn set_held(&mut self, held: bool) {
        self.held = held;
        if held {
            self.counter = 0;
        }
    }

    /// Advance one native sample. Returns the raw signed PM value.
    pub fn clock(&mut self, noise: &Noise) -> i32 {
        if self.held {
            self.counter = 0;
        } else {
            let rate = self.frequency as u32;
            self.counter = self
                .counter
                .wrapping_add((0x10 | (rate & 0xf)) << (rate >> 4));
        }
        let position = (self.counter >> 22) & 0xff;
        if position != self.position {
            self.noise_sample = noise.lfo_sample();
            self.position = position;
        }

        let (am, pm) = match self.waveform {
            LfoWaveform::Saw => (position ^ 0xff, position),
            LfoWaveform::Square => {
                let am = if position & 0x80 != 0 { 0 } else { 0xff };
                (am, am ^ 0xff)
            }
            LfoWaveform::Triangle => {
                let am = if position & 0x80 != 0 {
                    (position & 0x7f) << 1
                } else {
                    ((position & 0x7f) ^ 0x7f) << 1
                };
                let ramp = if position & 0x40 != 0 {
                    (position & 0x3f) ^ 0x3f
                } else {
                    position & 0x3f
                };
                let mut pm = ramp << 2;
                if position & 0x80 != 0 {
                    pm ^= 0xff;
                }
                (am, pm)
            }
            LfoWaveform::Noise => (self.noise_sample, self.noise_sample),
        };

        self.am = (am * self.am_depth as u32) >> 7;
        // pm is a signed 8-bit value
        ((pm as u8 as i8) as i32 * self.pm_depth as i32) >> 7
    }

    /// Current AM value (0-255, depth applied)
    pub fn am(&self) -> u32 {
        self.am
    }
}

/// Channel AM attenuation offset for an AMS sensitivity (0-3).
pub fn am_offset(lfo_am: u32, sensitivity: u8) -> u32 {
    match sensitivity & 3 {
        0 => 0,
        s => lfo_am << (s - 1),
    }
}

/// Channel PM delta in 1/64 semitones for a PMS sensitivity (0-7).
pub fn pm_delta(raw_pm: i32, sensitivity: u8) -> i32 {
    match sensitivity & 7 {
        0 => 0,
        s if s < 6 => raw_pm >> (6 - s),
        s => raw_pm << (s - 5),
    }
}

/// Noise LFSR.
#[derive(Debug, Clone, Default)]
pub struct Noise {
    lfsr: u32,
    counter: u32,
    frequency: u8,
    enabled: bool,
    state: bool,
}

impl Noise {
    /// Noise generator at power-on
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply register 0x0F.
    pub fn configure(&mut self, enabled: bool, frequency: u8) {
        self.enabled = enabled;
        self.frequency = frequency & 0x1f;
    }

    /// Whether channel 7 C2 outputs noise
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Current output bit
    pub fn state(&self) -> bool {
        self.state
    }

    /// Advance one native sample (the shift register runs at twice that rate).
    pub fn clock(&mut self) {
        let period = (self.frequency ^ 0x1f) as u32;
        for _ in 0..2 {
            // shift first, then tap the shifted register
            self.lfsr = (self.lfsr << 1) & 0x1ff_ffff;
            self.lfsr |= ((self.lfsr >> 17) ^ (self.lfsr >> 14) ^ 1) & 1;
            if self.counter >= period {
                self.counter = 0;
                self.state = (self.lfsr >> 17) & 1 != 0;
            } else {
                self.counter += 1;
            }
        }
    }

    /// Eight bits of the register for the LFO noise waveform.
    fn lfo_sample(&self) -> u32 {
        (self.lfsr >> 9) & 0xff
    }
}
