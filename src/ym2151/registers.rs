//! YM2151 Register Definitions
//!
//! The chip exposes a flat 256-byte address space. [`decode`] turns an (address, value)
//! pair into a [`RegisterWrite`] describing exactly which parameters change; the chip
//! applies it to its channel and operator state right away.

use std::fmt;

use super::lfo::LfoWaveform;
use super::operator::OperatorId;

/// Address of the key on/off register.
pub const KEY_ON_ADDR: u8 = 0x08;

/// An operator slot: one of 32 (channel, operator) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Channel 0-7
    pub channel: u8,
    /// Operator within the channel
    pub operator: OperatorId,
}

impl Slot {
    /// Slot addressed by the low 5 bits of a per-operator register.
    pub fn from_address(address: u8) -> Self {
        Slot {
            channel: address & 7,
            operator: OperatorId::from_slot_group((address >> 3) & 3),
        }
    }
}

/// A decoded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// 0x01: test register, only the LFO reset bit is emulated
    Test {
        /// Hold the LFO counter at zero
        lfo_reset: bool,
    },
    /// 0x08: key on/off for one channel
    KeyOn {
        /// Channel 0-7
        channel: u8,
        /// Operator bits as in the register (bit 3 M1, 4 C1, 5 M2, 6 C2)
        operators: u8,
    },
    /// 0x0F: noise control
    Noise {
        /// Replace channel 7 C2 with noise
        enabled: bool,
        /// 5-bit noise frequency
        frequency: u8,
    },
    /// 0x10: timer A period, upper 8 bits
    TimerAHigh(u8),
    /// 0x11: timer A period, lower 2 bits
    TimerALow(u8),
    /// 0x12: timer B period
    TimerB(u8),
    /// 0x14: timer control and CSM
    TimerControl(u8),
    /// 0x18: LFO frequency
    LfoFrequency(u8),
    /// 0x19: AM or PM depth
    LfoDepth {
        /// true for PM depth, false for AM depth
        pitch: bool,
        /// 7-bit depth
        depth: u8,
    },
    /// 0x1B: control outputs and LFO waveform
    ControlWaveform {
        /// CT1 output level
        ct1: bool,
        /// CT2 output level
        ct2: bool,
        /// LFO waveform
        waveform: LfoWaveform,
    },
    /// 0x20-0x27: output enables, feedback, algorithm
    Routing {
        /// Channel 0-7
        channel: u8,
        /// Right output enable
        right: bool,
        /// Left output enable
        left: bool,
        /// Feedback level 0-7
        feedback: u8,
        /// Algorithm 0-7
        algorithm: u8,
    },
    /// 0x28-0x2F: key code (octave and note)
    KeyCode {
        /// Channel 0-7
        channel: u8,
        /// 7-bit key code
        code: u8,
    },
    /// 0x30-0x37: key fraction
    KeyFraction {
        /// Channel 0-7
        channel: u8,
        /// 6-bit fraction
        fraction: u8,
    },
    /// 0x38-0x3F: LFO sensitivities
    Sensitivity {
        /// Channel 0-7
        channel: u8,
        /// PMS 0-7
        pms: u8,
        /// AMS 0-3
        ams: u8,
    },
    /// 0x40-0x5F
    DetuneMultiple {
        /// Target slot
        slot: Slot,
        /// DT1 0-7
        detune1: u8,
        /// MUL 0-15
        multiple: u8,
    },
    /// 0x60-0x7F
    TotalLevel {
        /// Target slot
        slot: Slot,
        /// TL 0-127
        level: u8,
    },
    /// 0x80-0x9F
    KeyScaleAttack {
        /// Target slot
        slot: Slot,
        /// KS 0-3
        key_scale: u8,
        /// AR 0-31
        attack_rate: u8,
    },
    /// 0xA0-0xBF
    AmDecay1 {
        /// Target slot
        slot: Slot,
        /// AMS-EN
        am_enable: bool,
        /// D1R 0-31
        decay1_rate: u8,
    },
    /// 0xC0-0xDF
    Detune2Decay2 {
        /// Target slot
        slot: Slot,
        /// DT2 0-3
        detune2: u8,
        /// D2R 0-31
        decay2_rate: u8,
    },
    /// 0xE0-0xFF
    Decay1LevelRelease {
        /// Target slot
        slot: Slot,
        /// D1L 0-15
        decay1_level: u8,
        /// RR 0-15
        release_rate: u8,
    },
}

/// Decode a register write. Returns `None` for addresses the chip does not map.
pub fn decode(address: u8, value: u8) -> Option<RegisterWrite> {
    let channel = address & 7;
    let write = match address {
        0x01 => RegisterWrite::Test {
            lfo_reset: value & 0x02 != 0,
        },
        KEY_ON_ADDR => RegisterWrite::KeyOn {
            channel: value & 7,
            operators: value & 0x78,
        },
        0x0f => RegisterWrite::Noise {
            enabled: value & 0x80 != 0,
            frequency: value & 0x1f,
        },
        0x10 => RegisterWrite::TimerAHigh(value),
        0x11 => RegisterWrite::TimerALow(value & 3),
        0x12 => RegisterWrite::TimerB(value),
        0x14 => RegisterWrite::TimerControl(value),
        0x18 => RegisterWrite::LfoFrequency(value),
        0x19 => RegisterWrite::LfoDepth {
            pitch: value & 0x80 != 0,
            depth: value & 0x7f,
        },
        0x1b => RegisterWrite::ControlWaveform {
            ct1: value & 0x40 != 0,
            ct2: value & 0x80 != 0,
            waveform: LfoWaveform::from_bits(value),
        },
        0x20..=0x27 => RegisterWrite::Routing {
            channel,
            right: value & 0x80 != 0,
            left: value & 0x40 != 0,
            feedback: (value >> 3) & 7,
            algorithm: value & 7,
        },
        0x28..=0x2f => RegisterWrite::KeyCode {
            channel,
            code: value & 0x7f,
        },
        0x30..=0x37 => RegisterWrite::KeyFraction {
            channel,
            fraction: value >> 2,
        },
        0x38..=0x3f => RegisterWrite::Sensitivity {
            channel,
            pms: (value >> 4) & 7,
            ams: value & 3,
        },
        0x40..=0x5f => RegisterWrite::DetuneMultiple {
            slot: Slot::from_address(address),
            detune1: (value >> 4) & 7,
            multiple: value & 0x0f,
        },
        0x60..=0x7f => RegisterWrite::TotalLevel {
            slot: Slot::from_address(address),
            level: value & 0x7f,
        },
        0x80..=0x9f => RegisterWrite::KeyScaleAttack {
            slot: Slot::from_address(address),
            key_scale: value >> 6,
            attack_rate: value & 0x1f,
        },
        0xa0..=0xbf => RegisterWrite::AmDecay1 {
            slot: Slot::from_address(address),
            am_enable: value & 0x80 != 0,
            decay1_rate: value & 0x1f,
        },
        0xc0..=0xdf => RegisterWrite::Detune2Decay2 {
            slot: Slot::from_address(address),
            detune2: value >> 6,
            decay2_rate: value & 0x1f,
        },
        0xe0..=0xff => RegisterWrite::Decay1LevelRelease {
            slot: Slot::from_address(address),
            decay1_level: value >> 4,
            release_rate: value & 0x0f,
        },
        _ => return None,
    };
    Some(write)
}

impl fmt::Display for RegisterWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterWrite::Test { lfo_reset } => write!(f, "TEST (LFO reset {lfo_reset})"),
            RegisterWrite::KeyOn { channel, operators } => {
                write!(f, "KON ch{channel} ops {:04b}", operators >> 3)
            }
            RegisterWrite::Noise { enabled, frequency } => {
                write!(f, "NOISE enable {enabled} freq {frequency}")
            }
            RegisterWrite::TimerAHigh(v) => write!(f, "CLKA1 {v:#04x}"),
            RegisterWrite::TimerALow(v) => write!(f, "CLKA2 {v}"),
            RegisterWrite::TimerB(v) => write!(f, "CLKB {v:#04x}"),
            RegisterWrite::TimerControl(v) => write!(f, "TIMER CTRL {v:#010b}"),
            RegisterWrite::LfoFrequency(v) => write!(f, "LFRQ {v:#04x}"),
            RegisterWrite::LfoDepth { pitch, depth } => {
                write!(f, "{} {depth}", if *pitch { "PMD" } else { "AMD" })
            }
            RegisterWrite::ControlWaveform { ct1, ct2, waveform } => {
                write!(f, "CT1 {ct1} CT2 {ct2} W {waveform:?}")
            }
            RegisterWrite::Routing {
                channel,
                right,
                left,
                feedback,
                algorithm,
            } => write!(
                f,
                "ch{channel} R {right} L {left} FL {feedback} CON {algorithm}"
            ),
            RegisterWrite::KeyCode { channel, code } => write!(f, "ch{channel} KC {code:#04x}"),
            RegisterWrite::KeyFraction { channel, fraction } => {
                write!(f, "ch{channel} KF {fraction}")
            }
            RegisterWrite::Sensitivity { channel, pms, ams } => {
                write!(f, "ch{channel} PMS {pms} AMS {ams}")
            }
            RegisterWrite::DetuneMultiple {
                slot,
                detune1,
                multiple,
            } => write!(f, "{slot} DT1 {detune1} MUL {multiple}"),
            RegisterWrite::TotalLevel { slot, level } => write!(f, "{slot} TL {level}"),
            RegisterWrite::KeyScaleAttack {
                slot,
                key_scale,
                attack_rate,
            } => write!(f, "{slot} KS {key_scale} AR {attack_rate}"),
            RegisterWrite::AmDecay1 {
                slot,
                am_enable,
                decay1_rate,
            } => write!(f, "{slot} AMS-EN {am_enable} D1R {decay1_rate}"),
            RegisterWrite::Detune2Decay2 {
                slot,
                detune2,
                decay2_rate,
            } => write!(f, "{slot} DT2 {detune2} D2R {decay2_rate}"),
            RegisterWrite::Decay1LevelRelease {
                slot,
                decay1_level,
                release_rate,
            } => write!(f, "{slot} D1L {decay1_level} RR {release_rate}"),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{} {:?}", self.channel, self.operator)
    }
}

/// Shadow copy of the last value written to each mapped address
#[derive(Debug, Clone)]
pub struct RegisterBank {
    registers: [u8; 256],
}

impl RegisterBank {
    /// Create a new register bank with all values set to 0
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; 256],
        }
    }

    /// Read a register value
    pub fn read(&self, addr: u8) -> u8 {
        self.registers[addr as usize]
    }

    /// Write a register value
    pub fn write(&mut self, addr: u8, value: u8) {
        self.registers[addr as usize] = value;
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_addresses() {
        for addr in [0x00, 0x02, 0x07, 0x09, 0x0e, 0x13, 0x15, 0x1a, 0x1f] {
            assert_eq!(decode(addr, 0xff), None, "addr {addr:#04x}");
        }
    }

    #[test]
    fn slot_addressing() {
        // low three bits pick the channel, the next two the operator group M1, M2, C1, C2
        let cases = [
            (0x60, 0, OperatorId::M1),
            (0x6f, 7, OperatorId::M2),
            (0x72, 2, OperatorId::C1),
            (0x7d, 5, OperatorId::C2),
        ];
        for (addr, channel, operator) in cases {
            assert_eq!(
                decode(addr, 0x20),
                Some(RegisterWrite::TotalLevel {
                    slot: Slot { channel, operator },
                    level: 0x20
                })
            );
        }
    }

    #[test]
    fn values_are_masked_not_rejected() {
        assert_eq!(
            decode(0x28, 0xcd),
            Some(RegisterWrite::KeyCode {
                channel: 0,
                code: 0x4d
            })
        );
        assert_eq!(
            decode(0x27, 0xc7),
            Some(RegisterWrite::Routing {
                channel: 7,
                right: true,
                left: true,
                feedback: 0,
                algorithm: 7
            })
        );
        assert_eq!(
            decode(0x08, 0x78 | 3),
            Some(RegisterWrite::KeyOn {
                channel: 3,
                operators: 0x78
            })
        );
    }

    #[test]
    fn display_names_slot() {
        let write = decode(0xe0, 0xff).unwrap();
        assert_eq!(write.to_string(), "ch0 M1 D1L 15 RR 15");
    }

    #[test]
    fn register_bank() {
        let mut bank = RegisterBank::new();
        assert_eq!(bank.read(0xff), 0);
        bank.write(0xff, 0x42);
        assert_eq!(bank.read(0xff), 0x42);
    }
}
