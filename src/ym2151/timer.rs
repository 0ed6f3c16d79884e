//! Timers A and B
//!
//! Timer A counts native samples with a 10-bit period, timer B counts every 16 samples
//! with an 8-bit period. An overflow sets the status flag when its IRQ is enabled; with
//! CSM set, timer A overflow also keys on every slot for one sample.

use bitflags::bitflags;

bitflags! {
    /// Timer status flags as returned by the status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TimerStatus: u8 {
        /// Timer A overflowed
        const TIMER_A = 0x01;
        /// Timer B overflowed
        const TIMER_B = 0x02;
    }
}

bitflags! {
    /// Timer control register (0x14).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TimerControl: u8 {
        /// Start timer A
        const LOAD_A = 0x01;
        /// Start timer B
        const LOAD_B = 0x02;
        /// Raise a flag on timer A overflow
        const IRQ_A = 0x04;
        /// Raise a flag on timer B overflow
        const IRQ_B = 0x08;
        /// Clear timer A flag (strobe)
        const RESET_A = 0x10;
        /// Clear timer B flag (strobe)
        const RESET_B = 0x20;
        /// Composite sine mode
        const CSM = 0x80;
    }
}

const TIMER_B_PRESCALE: u8 = 16;

/// Timer block of the chip.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    period_a: u16,
    period_b: u8,
    control: TimerControl,
    counter_a: u16,
    counter_b: u16,
    prescaler_b: u8,
    status: TimerStatus,
}

impl Timers {
    /// Timers at power-on: stopped, flags clear
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upper 8 bits of the timer A period.
    pub fn set_period_a_high(&mut self, value: u8) {
        self.period_a = (self.period_a & 0x003) | ((value as u16) << 2);
    }

    /// Set the lower 2 bits of the timer A period.
    pub fn set_period_a_low(&mut self, value: u8) {
        self.period_a = (self.period_a & 0x3fc) | (value as u16 & 3);
    }

    /// Set the timer B period.
    pub fn set_period_b(&mut self, value: u8) {
        self.period_b = value;
    }

    /// Write the control register.
    pub fn write_control(&mut self, value: u8) {
        let control = TimerControl::from_bits_truncate(value);
        if control.contains(TimerControl::RESET_A) {
            self.status.remove(TimerStatus::TIMER_A);
        }
        if control.contains(TimerControl::RESET_B) {
            self.status.remove(TimerStatus::TIMER_B);
        }
        if control.contains(TimerControl::LOAD_A) && !self.control.contains(TimerControl::LOAD_A) {
            self.counter_a = self.period_a;
        }
        if control.contains(TimerControl::LOAD_B) && !self.control.contains(TimerControl::LOAD_B) {
            self.counter_b = self.period_b as u16;
            self.prescaler_b = 0;
        }
        self.control = control - (TimerControl::RESET_A | TimerControl::RESET_B);
    }

    /// Advance one native sample. Returns true when timer A overflowed in CSM mode.
    pub fn clock(&mut self) -> bool {
        let mut csm = false;

        if self.control.contains(TimerControl::LOAD_A) {
            self.counter_a += 1;
            if self.counter_a >= 1024 {
                self.counter_a = self.period_a;
                if self.control.contains(TimerControl::IRQ_A) {
                    self.status.insert(TimerStatus::TIMER_A);
                }
                csm = self.control.contains(TimerControl::CSM);
            }
        }

        if self.control.contains(TimerControl::LOAD_B) {
            self.prescaler_b += 1;
            if self.prescaler_b == TIMER_B_PRESCALE {
                self.prescaler_b = 0;
                self.counter_b += 1;
                if self.counter_b >= 256 {
                    self.counter_b = self.period_b as u16;
                    if self.control.contains(TimerControl::IRQ_B) {
                        self.status.insert(TimerStatus::TIMER_B);
                    }
                }
            }
        }

        csm
    }

    /// Current flags
    pub fn status(&self) -> TimerStatus {
        self.status
    }

    /// IRQ line level (active while any flag is set)
    pub fn irq(&self) -> bool {
        !self.status.is_empty()
    }
}
