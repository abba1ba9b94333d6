//! # Direct Memory Access
//!
//! Channel singletons for the GD32C1x3 DMA controllers, reduced to what a
//! memory-to-peripheral burst needs.
//!
//! The DMA clock is enabled by board bring-up before [`DmaExt::split`].

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    TransferComplete,
}

pub trait DmaExt {
    type Channels;

    fn split(self) -> Self::Channels;
}

/// Register access shared by every channel.
pub trait Channel: crate::Sealed {
    /// Associated peripheral `address`
    ///
    /// `inc` indicates whether the address will be incremented after every byte transfer
    fn set_peripheral_address(&mut self, address: u32, inc: bool);

    /// `address` where from/to data will be read/write
    ///
    /// `inc` indicates whether the address will be incremented after every byte transfer
    fn set_memory_address(&mut self, address: u32, inc: bool);

    /// Number of bytes to transfer
    fn set_transfer_length(&mut self, len: u16);

    /// Single-shot, byte-wide, memory to peripheral
    fn configure_memory_to_peripheral(&mut self);

    /// Starts the DMA transfer
    fn start(&mut self);

    /// Clears all channel flags and disables the channel
    fn stop(&mut self);

    fn listen(&mut self, event: Event);

    fn unlisten(&mut self, event: Event);
}

macro_rules! dma {
    ($($DMAX:ident: ($dmaX:ident, {
        $($CX:ident: (
            $chXctl:ident,
            $chXcnt:ident,
            $chXpaddr:ident,
            $chXmaddr:ident,

            $ChXctl:ident,
            $ChXcnt:ident,
            $ChXpaddr:ident,
            $ChXmaddr:ident,

            $cgifX:ident
        ),)+
    }),)+) => {
        $(
            pub mod $dmaX {
                use crate::pac::{$DMAX, dma0};

                use crate::dma::{Channel, DmaExt, Event};

                #[allow(clippy::manual_non_exhaustive)]
                pub struct Channels( $(pub $CX),+);

                $(
                    /// A singleton that represents a single DMAx channel (channel X in this case)
                    ///
                    /// This singleton has exclusive access to the registers of the DMAx channel X
                    pub struct $CX { _0: () }

                    impl crate::Sealed for $CX {}

                    impl $CX {
                        fn ch_ctl(&mut self) -> &dma0::$ChXctl {
                            unsafe { (*$DMAX::ptr()).$chXctl() }
                        }

                        fn ch_cnt(&mut self) -> &dma0::$ChXcnt {
                            unsafe { (*$DMAX::ptr()).$chXcnt() }
                        }

                        fn ch_paddr(&mut self) -> &dma0::$ChXpaddr {
                            unsafe { (*$DMAX::ptr()).$chXpaddr() }
                        }

                        fn ch_maddr(&mut self) -> &dma0::$ChXmaddr {
                            unsafe { (*$DMAX::ptr()).$chXmaddr() }
                        }

                        fn intc(&self) -> &dma0::Intc {
                            unsafe { (*$DMAX::ptr()).intc() }
                        }
                    }

                    impl Channel for $CX {
                        fn set_peripheral_address(&mut self, address: u32, inc: bool) {
                            self.ch_paddr().write(|w| unsafe { w.bits(address) } );
                            self.ch_ctl().modify(|_, w| w.pnaga().bit(inc) );
                        }

                        fn set_memory_address(&mut self, address: u32, inc: bool) {
                            self.ch_maddr().write(|w| unsafe { w.bits(address) } );
                            self.ch_ctl().modify(|_, w| w.mnaga().bit(inc) );
                        }

                        fn set_transfer_length(&mut self, len: u16) {
                            unsafe { self.ch_cnt().write(|w| w.bits(u32::from(len))); }
                        }

                        fn configure_memory_to_peripheral(&mut self) {
                            self.ch_ctl().modify(|_, w| {
                                w
                                    // memory to memory mode disabled
                                    .m2m()
                                    .clear_bit()
                                    // medium channel priority level
                                    .prio()
                                    .medium()
                                    // 8-bit memory size
                                    .mwidth()
                                    .bits8()
                                    // 8-bit peripheral size
                                    .pwidth()
                                    .bits8()
                                    // circular mode disabled
                                    .cmen()
                                    .clear_bit()
                                    // read from memory
                                    .dir()
                                    .set_bit()
                            });
                        }

                        fn start(&mut self) {
                            self.ch_ctl().modify(|_, w| w.chen().set_bit() );
                        }

                        fn stop(&mut self) {
                            self.intc().write(|w| w.$cgifX().set_bit());
                            self.ch_ctl().modify(|_, w| w.chen().clear_bit() );
                        }

                        fn listen(&mut self, event: Event) {
                            match event {
                                Event::TransferComplete => {
                                    self.ch_ctl().modify(|_, w| w.ftfie().set_bit())
                                }
                            }
                        }

                        fn unlisten(&mut self, event: Event) {
                            match event {
                                Event::TransferComplete => {
                                    self.ch_ctl().modify(|_, w| w.ftfie().clear_bit())
                                }
                            }
                        }
                    }
                )+

                impl DmaExt for $DMAX {
                    type Channels = Channels;

                    fn split(self) -> Channels {
                        // reset the DMA control registers (stops all on-going transfers)
                        $(
                            self.$chXctl().reset();
                            self.$chXcnt().reset();
                        )+

                        Channels( $($CX { _0: () }),+)
                    }
                }
            }
        )+
    }
}

dma! {
    Dma0: (dma0, {
        C0: (
            ch0ctl, ch0cnt, ch0paddr, ch0maddr,
            Ch0ctl, Ch0cnt, Ch0paddr, Ch0maddr,
            gifc0
        ),
        C1: (
            ch1ctl, ch1cnt, ch1paddr, ch1maddr,
            Ch1ctl, Ch1cnt, Ch1paddr, Ch1maddr,
            gifc1
        ),
        C2: (
            ch2ctl, ch2cnt, ch2paddr, ch2maddr,
            Ch2ctl, Ch2cnt, Ch2paddr, Ch2maddr,
            gifc2
        ),
        C3: (
            ch3ctl, ch3cnt, ch3paddr, ch3maddr,
            Ch3ctl, Ch3cnt, Ch3paddr, Ch3maddr,
            gifc3
        ),
        C4: (
            ch4ctl, ch4cnt, ch4paddr, ch4maddr,
            Ch4ctl, Ch4cnt, Ch4paddr, Ch4maddr,
            gifc4
        ),
        C5: (
            ch5ctl, ch5cnt, ch5paddr, ch5maddr,
            Ch5ctl, Ch5cnt, Ch5paddr, Ch5maddr,
            gifc5
        ),
        C6: (
            ch6ctl, ch6cnt, ch6paddr, ch6maddr,
            Ch6ctl, Ch6cnt, Ch6paddr, Ch6maddr,
            gifc6
        ),
    }),
    Dma1: (dma1, {
        C0: (
            ch0ctl, ch0cnt, ch0paddr, ch0maddr,
            Ch0ctl, Ch0cnt, Ch0paddr, Ch0maddr,
            gifc0
        ),
        C1: (
            ch1ctl, ch1cnt, ch1paddr, ch1maddr,
            Ch1ctl, Ch1cnt, Ch1paddr, Ch1maddr,
            gifc1
        ),
        C2: (
            ch2ctl, ch2cnt, ch2paddr, ch2maddr,
            Ch2ctl, Ch2cnt, Ch2paddr, Ch2maddr,
            gifc2
        ),
        C3: (
            ch3ctl, ch3cnt, ch3paddr, ch3maddr,
            Ch3ctl, Ch3cnt, Ch3paddr, Ch3maddr,
            gifc3
        ),
        C4: (
            ch4ctl, ch4cnt, ch4paddr, ch4maddr,
            Ch4ctl, Ch4cnt, Ch4paddr, Ch4maddr,
            gifc4
        ),
    }),
}
