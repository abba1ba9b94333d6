use std::sync::{Arc, Mutex};
use std::thread;

use eve_dma::{
    write_prefix, Burst, Config, DrainLimit, Error, Platform, State, TransferEngine,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Assert,
    Deassert,
    SuppressRx,
    RestoreRx,
    Arm(Vec<u8>),
    Ack,
    TransmitComplete(bool),
}

/// Records every call in order. `transmit_complete` reports busy for
/// `busy_polls` polls after each burst.
#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    busy_polls: u32,
    remaining_busy: u32,
    reject_arm: bool,
}

impl Recorder {
    fn busy_for(polls: u32) -> Self {
        Recorder {
            busy_polls: polls,
            ..Default::default()
        }
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn position(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().position(f).unwrap()
    }

    fn arms(&self) -> Vec<&Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Arm(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

impl Platform for Recorder {
    fn assert_chip_select(&mut self) {
        self.calls.push(Call::Assert);
    }

    fn deassert_chip_select(&mut self) {
        self.calls.push(Call::Deassert);
    }

    fn suppress_receive(&mut self) {
        self.calls.push(Call::SuppressRx);
    }

    fn restore_receive(&mut self) {
        self.calls.push(Call::RestoreRx);
    }

    fn arm_burst(&mut self, burst: Burst<'_>) -> Result<(), Error> {
        if self.reject_arm {
            return Err(Error::BurstRejected);
        }
        self.calls.push(Call::Arm(burst.as_bytes().to_vec()));
        self.remaining_busy = self.busy_polls;
        Ok(())
    }

    fn acknowledge_completion(&mut self) {
        self.calls.push(Call::Ack);
    }

    fn transmit_complete(&mut self) -> bool {
        let done = self.remaining_busy == 0;
        self.remaining_busy = self.remaining_busy.saturating_sub(1);
        self.calls.push(Call::TransmitComplete(done));
        done
    }
}

fn engine(platform: Recorder) -> TransferEngine<Recorder, 16> {
    TransferEngine::new(platform, Config::new())
}

#[test]
fn four_words_end_to_end() {
    let engine = engine(Recorder::busy_for(2));
    {
        let (mut tx, mut done) = engine.split().unwrap();
        tx.buffer().unwrap().set_prefix(write_prefix(0x30_2578));
        for word in [0xffff_ff00u32, 0x2200_0000, 0x0000_0000, 0x1234_5678] {
            tx.append(word).unwrap();
        }
        assert_eq!(tx.buffer().unwrap().length_in_bytes(), 16);

        tx.start().unwrap();
        assert!(tx.is_busy());
        assert_eq!(engine.state(), State::Busy);

        assert!(done.on_transfer_complete());
        assert!(!tx.is_busy());
        assert_eq!(tx.buffer().unwrap().cursor(), 1);
        assert_eq!(tx.buffer().unwrap().length_in_bytes(), 0);
        assert_eq!(tx.transfers(), 1);
    }

    let (recorder, _) = engine.release();
    assert_eq!(recorder.count(&Call::Assert), 1);
    assert_eq!(recorder.count(&Call::Deassert), 1);
    assert!(recorder.position(|c| *c == Call::Assert) < recorder.position(|c| *c == Call::Deassert));

    let arms = recorder.arms();
    assert_eq!(arms.len(), 1);
    assert_eq!(arms[0].len(), 4 * 4 + 3);
    assert_eq!(&arms[0][..3], &[0xb0, 0x25, 0x78]);
    assert_eq!(&arms[0][3..7], &0xffff_ff00u32.to_ne_bytes());
}

#[test]
fn start_calls_in_order() {
    let engine = engine(Recorder::default());
    {
        let (mut tx, mut done) = engine.split().unwrap();
        tx.append(1).unwrap();
        tx.start().unwrap();
        done.on_transfer_complete();
    }

    let (recorder, _) = engine.release();
    let bytes = recorder.arms()[0].clone();
    assert_eq!(
        recorder.calls,
        vec![
            Call::Assert,
            Call::SuppressRx,
            Call::Arm(bytes),
            Call::Ack,
            Call::TransmitComplete(true),
            Call::RestoreRx,
            Call::Deassert,
        ]
    );
}

#[test]
fn deassert_waits_for_shift_register() {
    let engine = engine(Recorder::busy_for(5));
    {
        let (mut tx, mut done) = engine.split().unwrap();
        tx.append(1).unwrap();
        tx.start().unwrap();
        done.on_transfer_complete();
    }

    let (recorder, _) = engine.release();
    let polls: Vec<_> = recorder
        .calls
        .iter()
        .filter(|c| matches!(c, Call::TransmitComplete(_)))
        .collect();
    assert_eq!(polls.len(), 6);
    assert_eq!(*polls[5], Call::TransmitComplete(true));

    let drained = recorder.position(|c| *c == Call::TransmitComplete(true));
    let ack = recorder.position(|c| *c == Call::Ack);
    let deassert = recorder.position(|c| *c == Call::Deassert);
    assert!(ack < drained);
    assert!(drained < deassert);
}

#[test]
fn second_start_is_rejected_without_side_effects() {
    let engine = engine(Recorder::default());
    {
        let (mut tx, mut done) = engine.split().unwrap();
        tx.append(1).unwrap();
        tx.start().unwrap();

        assert_eq!(tx.start(), Err(Error::ConcurrentAccess));
        assert_eq!(engine.state(), State::Busy);
        assert_eq!(tx.append(2), Err(Error::ConcurrentAccess));
        assert_eq!(tx.extend_from_slice(&[2, 3]), Err(Error::ConcurrentAccess));
        assert!(tx.buffer().is_err());

        done.on_transfer_complete();
    }

    let (recorder, buffer) = engine.release();
    assert_eq!(recorder.count(&Call::Assert), 1);
    assert_eq!(recorder.arms().len(), 1);
    assert!(buffer.is_empty());
}

#[test]
fn empty_start_is_a_no_op() {
    let engine = engine(Recorder::default());
    {
        let (mut tx, _done) = engine.split().unwrap();
        assert_eq!(tx.start(), Ok(()));
        assert!(!tx.is_busy());
    }

    let (recorder, _) = engine.release();
    assert!(recorder.calls.is_empty());
}

#[test]
fn spurious_completion_is_ignored() {
    let engine = engine(Recorder::default());
    {
        let (_tx, mut done) = engine.split().unwrap();
        assert!(!done.on_transfer_complete());
        assert!(!done.is_busy());
    }

    assert_eq!(engine.transfers(), 0);
    let (recorder, _) = engine.release();
    assert!(recorder.calls.is_empty());
}

#[test]
fn rejected_arm_releases_chip_select() {
    let engine = engine(Recorder {
        reject_arm: true,
        ..Default::default()
    });
    {
        let (mut tx, _done) = engine.split().unwrap();
        tx.append(1).unwrap();
        assert_eq!(tx.start(), Err(Error::BurstRejected));
        assert!(!tx.is_busy());
        // the payload is kept for a retry
        assert_eq!(tx.buffer().unwrap().length_in_bytes(), 4);
    }

    let (recorder, _) = engine.release();
    assert_eq!(
        recorder.calls,
        vec![
            Call::Assert,
            Call::SuppressRx,
            Call::RestoreRx,
            Call::Deassert,
        ]
    );
}

#[test]
fn full_buffer_then_flush_and_reuse() {
    let engine = engine(Recorder::default());
    let (mut tx, mut done) = engine.split().unwrap();

    for word in 0..15 {
        tx.append(word).unwrap();
    }
    assert_eq!(tx.append(15), Err(Error::BufferFull));
    assert_eq!(tx.buffer().unwrap().length_in_bytes(), 15 * 4);

    tx.start().unwrap();
    done.on_transfer_complete();
    tx.append(15).unwrap();
    assert_eq!(tx.buffer().unwrap().payload(), &[15]);
}

#[test]
fn bounded_drain_tolerates_slow_peripheral() {
    let engine = TransferEngine::<_, 16>::new(
        Recorder::busy_for(3),
        Config::new().drain_limit(DrainLimit::Polls(3)),
    );
    let (mut tx, mut done) = engine.split().unwrap();
    tx.append(1).unwrap();
    tx.start().unwrap();
    assert!(done.on_transfer_complete());
    assert!(!tx.is_busy());
}

#[test]
#[should_panic(expected = "still busy after 3 polls")]
fn bounded_drain_escalates() {
    let engine = TransferEngine::<_, 16>::new(
        Recorder::busy_for(4),
        Config::new().drain_limit(DrainLimit::Polls(3)),
    );
    let (mut tx, mut done) = engine.split().unwrap();
    tx.append(1).unwrap();
    tx.start().unwrap();
    done.on_transfer_complete();
}

#[test]
fn poll_idle_reports_would_block() {
    let engine = engine(Recorder::default());
    let (mut tx, mut done) = engine.split().unwrap();
    assert_eq!(tx.poll_idle(), Ok(()));

    tx.append(1).unwrap();
    tx.start().unwrap();
    assert_eq!(tx.poll_idle(), Err(nb::Error::WouldBlock));

    done.on_transfer_complete();
    assert_eq!(tx.poll_idle(), Ok(()));
    tx.flush();
}

#[test]
fn idle_future_resolves_after_completion() {
    let engine = engine(Recorder::default());
    let (mut tx, mut done) = engine.split().unwrap();
    futures::executor::block_on(tx.idle());

    tx.append(1).unwrap();
    tx.start().unwrap();

    thread::scope(|s| {
        s.spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            done.on_transfer_complete();
        });
        futures::executor::block_on(tx.idle());
    });
    assert!(!engine.is_busy());
    assert_eq!(engine.transfers(), 1);
}

#[test]
fn producer_and_interrupt_on_separate_threads() {
    const BURSTS: u32 = 200;

    let engine = engine(Recorder::default());
    let (mut tx, mut done) = engine.split().unwrap();
    let handled = Arc::new(Mutex::new(0u32));

    thread::scope(|s| {
        let handled = handled.clone();
        let engine = &engine;
        s.spawn(move || {
            while engine.transfers() < BURSTS {
                if done.on_transfer_complete() {
                    *handled.lock().unwrap() += 1;
                }
                thread::yield_now();
            }
        });

        for burst in 0..BURSTS {
            tx.flush();
            tx.extend_from_slice(&[burst, burst + 1]).unwrap();
            tx.start().unwrap();
        }
        tx.flush();
    });

    assert_eq!(*handled.lock().unwrap(), BURSTS);
    let (recorder, buffer) = engine.release();
    assert_eq!(recorder.arms().len(), BURSTS as usize);
    assert_eq!(recorder.count(&Call::Assert), BURSTS as usize);
    assert_eq!(recorder.count(&Call::Deassert), BURSTS as usize);
    assert!(buffer.is_empty());
    for (burst, bytes) in recorder.arms().iter().enumerate() {
        assert_eq!(&bytes[3..7], &(burst as u32).to_ne_bytes());
    }
}
