//! # Transfer engine
//!
//! Hands one buffer at a time to a DMA-driven SPI peripheral and tracks the
//! burst until the completion interrupt has closed the chip-select frame.
//!
//! The engine is split once into a [`Transmitter`] for the producer and a
//! [`Completion`] for the interrupt handler. Ownership of the buffer and the
//! platform moves between the two with the busy flag: the transmitter may only
//! touch them while the engine is idle, the completion side only while a burst
//! is in flight.
//!
//! ```text
//!  Idle --append*--> Idle --start()--> Busy --on_transfer_complete()--> Idle
//! ```

use core::cell::UnsafeCell;
use core::convert::Infallible;
use core::future::{poll_fn, Future};
use core::hint::spin_loop;
use core::sync::atomic::{compiler_fence, AtomicBool, AtomicU32, AtomicU8, Ordering};
use core::task::Poll;

use embassy_sync::waitqueue::AtomicWaker;

use crate::buffer::{TransferBuffer, DEFAULT_CAPACITY};
use crate::platform::Platform;
use crate::Error;

/// Busy flag values. `Busy` uses a sentinel distinct from zero so a stuck
/// engine is easy to spot in a memory dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Busy = 42,
}

impl State {
    fn from_bits(bits: u8) -> Self {
        if bits == State::Idle as u8 {
            State::Idle
        } else {
            State::Busy
        }
    }
}

/// How long the completion handler waits for the shift register to drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrainLimit {
    /// Poll until the peripheral reports idle, however long that takes.
    Unbounded,
    /// Panic after this many polls that still find the peripheral busy.
    Polls(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub drain_limit: DrainLimit,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            drain_limit: DrainLimit::Unbounded,
        }
    }

    pub const fn drain_limit(mut self, limit: DrainLimit) -> Self {
        self.drain_limit = limit;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared<P, const N: usize> {
    buffer: TransferBuffer<N>,
    platform: P,
}

pub struct TransferEngine<P, const N: usize = DEFAULT_CAPACITY> {
    state: AtomicU8,
    split: AtomicBool,
    transfers: AtomicU32,
    waker: AtomicWaker,
    config: Config,
    shared: UnsafeCell<Shared<P, N>>,
}

// NOTE(unsafe) `shared` is only reached through the two handles handed out by
// `split`, and each of them touches it only in its own half of the state
// machine.
unsafe impl<P: Send, const N: usize> Sync for TransferEngine<P, N> {}

impl<P, const N: usize> TransferEngine<P, N>
where
    P: Platform,
{
    pub const fn new(platform: P, config: Config) -> Self {
        TransferEngine {
            state: AtomicU8::new(State::Idle as u8),
            split: AtomicBool::new(false),
            transfers: AtomicU32::new(0),
            waker: AtomicWaker::new(),
            config,
            shared: UnsafeCell::new(Shared {
                buffer: TransferBuffer::new(),
                platform,
            }),
        }
    }

    /// Hands out the producer and interrupt handles.
    ///
    /// Returns `None` on every call after the first.
    pub fn split(&self) -> Option<(Transmitter<'_, P, N>, Completion<'_, P, N>)> {
        if self.split.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((Transmitter { engine: self }, Completion { engine: self }))
    }

    pub fn state(&self) -> State {
        State::from_bits(self.state.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.state() == State::Busy
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Number of bursts finalized so far
    pub fn transfers(&self) -> u32 {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Releases the platform and the buffer.
    pub fn release(self) -> (P, TransferBuffer<N>) {
        let Shared { buffer, platform } = self.shared.into_inner();
        (platform, buffer)
    }
}

/// Producer handle: fills the buffer and starts bursts.
pub struct Transmitter<'a, P, const N: usize = DEFAULT_CAPACITY> {
    engine: &'a TransferEngine<P, N>,
}

impl<'a, P, const N: usize> Transmitter<'a, P, N>
where
    P: Platform,
{
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    pub fn transfers(&self) -> u32 {
        self.engine.transfers()
    }

    /// Mutable access to the buffer while no burst is in flight.
    pub fn buffer(&mut self) -> Result<&mut TransferBuffer<N>, Error> {
        if self.engine.is_busy() {
            warn!("buffer requested while a burst is in flight");
            return Err(Error::ConcurrentAccess);
        }
        // NOTE(unsafe) the engine is idle, so the completion side keeps its
        // hands off `shared` until `start` flips the flag, which needs
        // `&mut self` and so ends this borrow first
        Ok(unsafe { &mut (*self.engine.shared.get()).buffer })
    }

    pub fn append(&mut self, word: u32) -> Result<(), Error> {
        self.buffer()?.append(word)
    }

    pub fn extend_from_slice(&mut self, words: &[u32]) -> Result<(), Error> {
        self.buffer()?.extend_from_slice(words)
    }

    /// Starts sending the queued words.
    ///
    /// An empty buffer is a no-op. While a burst is in flight the call is
    /// rejected with [`Error::ConcurrentAccess`] and has no side effect. This
    /// holds in debug builds too: the misuse is reported through the `Result`
    /// rather than a debug assertion.
    pub fn start(&mut self) -> Result<(), Error> {
        let engine = self.engine;
        // the completion interrupt must not observe a burst that is armed but
        // not yet marked busy
        critical_section::with(|_| {
            if engine.is_busy() {
                warn!("start requested while a burst is in flight");
                return Err(Error::ConcurrentAccess);
            }

            // NOTE(unsafe) idle, and the completion side cannot run inside
            // the critical section
            let shared = unsafe { &mut *engine.shared.get() };
            if shared.buffer.is_empty() {
                trace!("start with nothing queued");
                return Ok(());
            }

            shared.platform.assert_chip_select();
            shared.platform.suppress_receive();

            // buffer writes must land before the DMA starts reading
            compiler_fence(Ordering::Release);

            let burst = shared.buffer.burst();
            let len = burst.len();
            if let Err(e) = shared.platform.arm_burst(burst) {
                warn!("platform rejected a burst of {=usize} bytes", len);
                shared.platform.restore_receive();
                shared.platform.deassert_chip_select();
                return Err(e);
            }

            engine.state.store(State::Busy as u8, Ordering::Release);
            debug!("burst of {=usize} bytes armed", len);
            Ok(())
        })
    }

    /// `WouldBlock` until the in-flight burst has been finalized.
    pub fn poll_idle(&self) -> nb::Result<(), Infallible> {
        if self.engine.is_busy() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Spins until the engine is idle.
    pub fn flush(&self) {
        nb::block!(self.poll_idle()).unwrap_or_else(|never| match never {})
    }

    /// Resolves once the engine is idle.
    pub fn idle(&self) -> impl Future<Output = ()> + 'a {
        let engine = self.engine;
        poll_fn(move |cx| {
            if !engine.is_busy() {
                return Poll::Ready(());
            }
            engine.waker.register(cx.waker());
            // the burst may have finished before the waker was in place
            if engine.is_busy() {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
    }
}

/// Interrupt handle: finalizes a burst once the platform signals completion.
pub struct Completion<'a, P, const N: usize = DEFAULT_CAPACITY> {
    engine: &'a TransferEngine<P, N>,
}

impl<P, const N: usize> Completion<'_, P, N>
where
    P: Platform,
{
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Call from the transfer-complete interrupt.
    ///
    /// Returns `false` for a spurious event with no burst in flight, which
    /// is otherwise ignored.
    ///
    /// # Panics
    ///
    /// With [`DrainLimit::Polls`], panics if the peripheral is still busy
    /// after that many polls.
    pub fn on_transfer_complete(&mut self) -> bool {
        let engine = self.engine;
        if !engine.is_busy() {
            warn!("completion event with no burst in flight");
            return false;
        }

        // NOTE(unsafe) a burst is in flight, so the transmitter stays away
        // from `shared` until the flag goes back to idle below
        let shared = unsafe { &mut *engine.shared.get() };
        shared.platform.acknowledge_completion();
        drain(&mut shared.platform, engine.config.drain_limit);
        shared.platform.restore_receive();
        shared.platform.deassert_chip_select();
        shared.buffer.reset();

        let transfers = engine.transfers.load(Ordering::Relaxed).wrapping_add(1);
        engine.transfers.store(transfers, Ordering::Relaxed);
        trace!("burst {=u32} finalized", transfers);

        engine.state.store(State::Idle as u8, Ordering::Release);
        engine.waker.wake();
        true
    }
}

/// Closes the gap between the DMA having fed the last byte and the last bit
/// leaving the pins.
fn drain<P: Platform>(platform: &mut P, limit: DrainLimit) {
    match limit {
        DrainLimit::Unbounded => {
            while !platform.transmit_complete() {
                spin_loop();
            }
        }
        DrainLimit::Polls(max) => {
            let mut busy_polls = 0;
            while !platform.transmit_complete() {
                if busy_polls == max {
                    error!("peripheral still busy after {=u32} polls", max);
                    panic!("SPI peripheral still busy after {} polls", max);
                }
                busy_polls += 1;
                spin_loop();
            }
        }
    }
}
