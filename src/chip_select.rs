//! Chip select polarity adapters over `embedded-hal` output pins.

use crate::hal::digital::v2::OutputPin;

/// Chip select that is active when driven low, as on EVE controllers.
pub struct ActiveLow<PIN> {
    pin: PIN,
}

impl<PIN: OutputPin> ActiveLow<PIN> {
    /// Wraps `pin` and drives it to the inactive (high) level.
    pub fn new(mut pin: PIN) -> Result<Self, PIN::Error> {
        pin.set_high()?;
        Ok(ActiveLow { pin })
    }

    pub fn assert(&mut self) -> Result<(), PIN::Error> {
        self.pin.set_low()
    }

    pub fn deassert(&mut self) -> Result<(), PIN::Error> {
        self.pin.set_high()
    }

    pub fn release(self) -> PIN {
        self.pin
    }
}

/// Chip select that is active when driven high.
pub struct ActiveHigh<PIN> {
    pin: PIN,
}

impl<PIN: OutputPin> ActiveHigh<PIN> {
    /// Wraps `pin` and drives it to the inactive (low) level.
    pub fn new(mut pin: PIN) -> Result<Self, PIN::Error> {
        pin.set_low()?;
        Ok(ActiveHigh { pin })
    }

    pub fn assert(&mut self) -> Result<(), PIN::Error> {
        self.pin.set_high()
    }

    pub fn deassert(&mut self) -> Result<(), PIN::Error> {
        self.pin.set_low()
    }

    pub fn release(self) -> PIN {
        self.pin
    }
}

/// Polarity-independent chip select drive.
pub trait ChipSelect {
    type Error;

    fn assert(&mut self) -> Result<(), Self::Error>;
    fn deassert(&mut self) -> Result<(), Self::Error>;
}

impl<PIN: OutputPin> ChipSelect for ActiveLow<PIN> {
    type Error = PIN::Error;

    fn assert(&mut self) -> Result<(), PIN::Error> {
        ActiveLow::assert(self)
    }

    fn deassert(&mut self) -> Result<(), PIN::Error> {
        ActiveLow::deassert(self)
    }
}

impl<PIN: OutputPin> ChipSelect for ActiveHigh<PIN> {
    type Error = PIN::Error;

    fn assert(&mut self) -> Result<(), PIN::Error> {
        ActiveHigh::assert(self)
    }

    fn deassert(&mut self) -> Result<(), PIN::Error> {
        ActiveHigh::deassert(self)
    }
}
