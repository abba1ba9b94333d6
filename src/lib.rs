//! # eve-dma
//!
//! Interrupt-driven SPI DMA transfers for EVE graphics controllers.
//!
//! A [`TransferEngine`] owns one [`TransferBuffer`] and one [`Platform`]
//! backend. The producer fills the buffer through a [`Transmitter`] and kicks
//! off a burst; the DMA interrupt calls [`Completion::on_transfer_complete`],
//! which waits for the SPI shift register to drain before releasing chip
//! select. Exactly one burst is in flight at a time.
//!
//! ```rust,ignore
//! let (mut tx, mut completion) = engine.split().unwrap();
//!
//! tx.flush();
//! tx.buffer()?.set_prefix(write_prefix(REG_CMDB_WRITE));
//! tx.extend_from_slice(&commands)?;
//! tx.start()?;
//!
//! // in the DMA interrupt
//! completion.on_transfer_complete();
//! ```
//!
//! The GD32C1x3 backend in the `spi` module is built when one of the `gd32c103` or
//! `gd32c113` features is selected. Without either, only the portable core is
//! compiled.
#![cfg_attr(not(test), no_std)]

// If any two or more targets are specified, print error message.
#[cfg(any(
    all(feature = "gd32c103", feature = "gd32c113"),
))]
compile_error!(
    "Multiple targets specified. Only a single target feature flag can be specified."
);

extern crate cortex_m;
pub extern crate embedded_hal as hal;
extern crate nb;

#[cfg(feature = "gd32c103")]
pub use gd32c1::gd32c103 as pac;
#[cfg(feature = "gd32c113")]
pub use gd32c1::gd32c113 as pac;

#[macro_use]
mod fmt;

pub mod buffer;
pub mod chip_select;
#[cfg(any(feature = "gd32c103", feature = "gd32c113"))]
pub mod dma;
pub mod engine;
pub mod platform;
#[cfg(any(feature = "gd32c103", feature = "gd32c113"))]
pub mod spi;

pub use buffer::{write_prefix, Burst, TransferBuffer};
pub use engine::{Completion, Config, DrainLimit, State, TransferEngine, Transmitter};
pub use platform::Platform;

/// Transfer engine error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The buffer has no room for another word
    BufferFull,
    /// The buffer or the engine was touched while a burst is in flight
    ConcurrentAccess,
    /// The platform refused to arm the burst
    BurstRejected,
}

#[allow(dead_code)]
mod sealed {
    pub trait Sealed {}
}

#[allow(unused_imports)]
use sealed::Sealed;
