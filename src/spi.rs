/*!
  # SPI transmit DMA backend

  [`SpiDmaPlatform`] drives an already configured GD32C1x3 SPI peripheral in
  transmit-only DMA mode. Bring-up (clocks, pins, mode, baud rate) happens
  before it is constructed.

  Each SPI instance is tied to its TX DMA channel:

  - `SPI0` uses `DMA0` channel 2
  - `SPI1` uses `DMA0` channel 4
  - `SPI2` uses `DMA1` channel 1

  ## Example

  ```rust,ignore
    let channels = dp.DMA0.split();
    let cs = ActiveLow::new(gpioa.pa4.into_push_pull_output(&mut gpioa.crl))?;
    let platform = SpiDmaPlatform::new(dp.SPI0, channels.2, cs);

    let engine = cortex_m::singleton!(: TransferEngine<Spi0Platform<_>> =
        TransferEngine::new(platform, Config::new())).unwrap();
    let (tx, completion) = engine.split().unwrap();
    // move `completion` to the DMA0_CHANNEL2 interrupt handler
  ```
*/

use core::convert::Infallible;
use core::ops::Deref;
use core::ptr;

use embedded_dma::ReadBuffer;

use crate::buffer::Burst;
use crate::chip_select::ChipSelect;
use crate::dma::{dma0, dma1, Channel, Event};
use crate::pac;
use crate::platform::Platform;
use crate::Error;

pub trait Instance: crate::Sealed + Deref<Target = pac::spi1::RegisterBlock> {}

impl crate::Sealed for pac::Spi0 {}
impl crate::Sealed for pac::Spi1 {}
impl crate::Sealed for pac::Spi2 {}

impl Instance for pac::Spi0 {}
impl Instance for pac::Spi1 {}
impl Instance for pac::Spi2 {}

/// DMA channel wired to the transmit request of `SPI`
pub trait TxChannel<SPI>: Channel {}

impl TxChannel<pac::Spi0> for dma0::C2 {}
impl TxChannel<pac::Spi1> for dma0::C4 {}
impl TxChannel<pac::Spi2> for dma1::C1 {}

pub struct SpiDmaPlatform<SPI, CHANNEL, CS> {
    spi: SPI,
    channel: CHANNEL,
    cs: CS,
    rx_interrupt: bool,
}

pub type Spi0Platform<CS> = SpiDmaPlatform<pac::Spi0, dma0::C2, CS>;
pub type Spi1Platform<CS> = SpiDmaPlatform<pac::Spi1, dma0::C4, CS>;
pub type Spi2Platform<CS> = SpiDmaPlatform<pac::Spi2, dma1::C1, CS>;

impl<SPI, CHANNEL, CS> SpiDmaPlatform<SPI, CHANNEL, CS>
where
    SPI: Instance,
    CHANNEL: TxChannel<SPI>,
    CS: ChipSelect<Error = Infallible>,
{
    pub fn new(spi: SPI, mut channel: CHANNEL, cs: CS) -> Self {
        channel.stop();
        channel.set_peripheral_address(spi.data() as *const _ as u32, false);
        channel.configure_memory_to_peripheral();
        channel.listen(Event::TransferComplete);

        spi.ctl1().modify(|_, w| w.dmaten().set_bit());

        SpiDmaPlatform {
            spi,
            channel,
            cs,
            rx_interrupt: false,
        }
    }

    pub fn release(self) -> (SPI, CHANNEL, CS) {
        let SpiDmaPlatform {
            spi,
            mut channel,
            cs,
            ..
        } = self;
        channel.unlisten(Event::TransferComplete);
        channel.stop();
        spi.ctl1().modify(|_, w| w.dmaten().clear_bit());
        (spi, channel, cs)
    }

    fn read_data_reg(&mut self) -> u8 {
        // NOTE(read_volatile) read only 1 byte (the svd2rust API only allows
        // reading a half-word)
        unsafe { ptr::read_volatile(self.spi.data() as *const _ as *const u8) }
    }
}

impl<SPI, CHANNEL, CS> Platform for SpiDmaPlatform<SPI, CHANNEL, CS>
where
    SPI: Instance,
    CHANNEL: TxChannel<SPI>,
    CS: ChipSelect<Error = Infallible>,
{
    fn assert_chip_select(&mut self) {
        self.cs.assert().unwrap_or_else(|never| match never {})
    }

    fn deassert_chip_select(&mut self) {
        self.cs.deassert().unwrap_or_else(|never| match never {})
    }

    // The receiver keeps shifting in while we transmit, so the RBNE
    // interrupt is masked for the burst and the overrun it causes is
    // cleared afterwards.
    fn suppress_receive(&mut self) {
        self.rx_interrupt = self.spi.ctl1().read().rbneie().bit_is_set();
        self.spi.ctl1().modify(|_, w| w.rbneie().clear_bit());
    }

    fn restore_receive(&mut self) {
        // Clear OVR set due to dropped received values
        let _ = self.read_data_reg();
        let _ = self.spi.stat().read();
        if self.rx_interrupt {
            self.spi.ctl1().modify(|_, w| w.rbneie().set_bit());
        }
    }

    fn arm_burst(&mut self, burst: Burst<'_>) -> Result<(), Error> {
        // NOTE(unsafe) the engine keeps the buffer untouched until the
        // completion event for this burst has been handled
        let (ptr, len) = unsafe { burst.read_buffer() };
        let len = u16::try_from(len).map_err(|_| Error::BurstRejected)?;

        self.channel.stop();
        self.channel.set_memory_address(ptr as u32, true);
        self.channel.set_transfer_length(len);
        self.channel.start();
        Ok(())
    }

    fn acknowledge_completion(&mut self) {
        self.channel.stop();
    }

    fn transmit_complete(&mut self) -> bool {
        let sr = self.spi.stat().read();
        sr.tbe().bit_is_set() && !sr.trans().bit_is_set()
    }
}
