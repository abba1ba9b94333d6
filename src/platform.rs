//! # Platform backends
//!
//! The capability set a target provides to the transfer engine. One
//! implementation exists per peripheral, selected at build time.
//!
//! The engine calls these from two contexts. `assert_chip_select`,
//! `suppress_receive` and `arm_burst` run on the producer side inside a
//! critical section; the rest run from the completion interrupt. The engine
//! guarantees the two sides never overlap.

use crate::buffer::Burst;
use crate::Error;

pub trait Platform {
    /// Drive chip select to its active level.
    fn assert_chip_select(&mut self);

    /// Release chip select.
    fn deassert_chip_select(&mut self);

    /// Keep the receiver from latching data while a transmit-only burst runs.
    ///
    /// Half-duplex and DMA-only peripherals leave this as a no-op.
    fn suppress_receive(&mut self) {}

    /// Undo [`Platform::suppress_receive`].
    fn restore_receive(&mut self) {}

    /// Start moving `burst` into the peripheral.
    ///
    /// Must not block. Every `Ok` return must be followed by exactly one
    /// completion event. The memory behind `burst` stays untouched until
    /// that event has been handled.
    fn arm_burst(&mut self, burst: Burst<'_>) -> Result<(), Error>;

    /// Clear the completion indication so the event does not fire again.
    fn acknowledge_completion(&mut self);

    /// Returns `true` once the last bit has left the shift register.
    ///
    /// Peripherals that only report completion after the wire is idle can
    /// keep the default.
    fn transmit_complete(&mut self) -> bool {
        true
    }
}

impl<P: Platform + ?Sized> Platform for &mut P {
    fn assert_chip_select(&mut self) {
        (**self).assert_chip_select()
    }

    fn deassert_chip_select(&mut self) {
        (**self).deassert_chip_select()
    }

    fn suppress_receive(&mut self) {
        (**self).suppress_receive()
    }

    fn restore_receive(&mut self) {
        (**self).restore_receive()
    }

    fn arm_burst(&mut self, burst: Burst<'_>) -> Result<(), Error> {
        (**self).arm_burst(burst)
    }

    fn acknowledge_completion(&mut self) {
        (**self).acknowledge_completion()
    }

    fn transmit_complete(&mut self) -> bool {
        (**self).transmit_complete()
    }
}
