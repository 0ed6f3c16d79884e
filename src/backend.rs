//! Backend trait abstraction for clock-driven sound chips
//!
//! The clock bridge, the offline renderer and the streaming source only need a chip that
//! accepts register writes and can be stepped one master cycle at a time. This module
//! defines that interface.

use crate::ym2151::ClockOutput;

/// Common interface for chip backends driven by an external clock
///
/// # Example
///
/// ```
/// use ym2151::{ChipBackend, Ym2151};
///
/// fn key_on_channel_zero<B: ChipBackend>(chip: &mut B) {
///     chip.write_register(0x20, 0xC7); // L+R, algorithm 7
///     chip.write_register(0x28, 0x4A); // A4
///     chip.write_register(0x08, 0x78); // key on all four operators
///
///     let out = chip.clock_step();
///     let _ = (out.left, out.right);
/// }
///
/// key_on_channel_zero(&mut Ym2151::new());
/// ```
pub trait ChipBackend: Send {
    /// Reset the backend to its power-on state
    ///
    /// Clears all registers, stops every note and zeroes all counters.
    fn reset(&mut self);

    /// Write a register
    ///
    /// # Arguments
    ///
    /// * `address` - Register address (0x00-0xFF)
    /// * `value` - Register value (0x00-0xFF)
    ///
    /// Addresses the chip does not map are ignored.
    fn write_register(&mut self, address: u8, value: u8);

    /// Advance the chip by one master clock cycle
    ///
    /// # Returns
    ///
    /// The held stereo output and side-band flags for this cycle
    fn clock_step(&mut self) -> ClockOutput;

    /// Master clock frequency in Hz
    fn clock_hz(&self) -> u32;
}
