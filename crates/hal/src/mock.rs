//! TEAM_463: Host stand-ins for the clock and serial hardware.
//!
//! Available under `cfg(test)` and the `std` feature so other crates can
//! drive their device logic from unit tests.

use crate::serial::{Parity, SerialPort};
use crate::timer::Clock;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use pfs_utils::Mutex;

/// Manually driven clock. Every read advances it by `step` so spin loops
/// make progress without a real timer.
pub struct MockClock {
    now: AtomicU64,
    step: u64,
}

impl MockClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
            step,
        }
    }

    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MockSerialState {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub rts: bool,
    pub rx_interrupt: bool,
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub cts_flow: bool,
    pub rts_flow: bool,
    /// Number of times RTS was deasserted
    pub rts_drops: usize,
    /// Cleared to model a full TX FIFO or a peer holding CTS
    pub tx_ready: bool,
}

/// Loopback-free fake UART. Clones share state, so a test keeps one clone
/// to feed input and inspect lines while the device owns the other.
#[derive(Clone, Default)]
pub struct MockSerial {
    state: Arc<Mutex<MockSerialState>>,
}

impl MockSerial {
    pub fn new() -> Self {
        let serial = Self::default();
        {
            let mut s = serial.state.lock();
            s.rts = true;
            s.rx_interrupt = true;
            s.baud = 115_200;
            s.data_bits = 8;
            s.stop_bits = 1;
            s.tx_ready = true;
        }
        serial
    }

    /// Queue bytes as if they arrived on the wire.
    pub fn feed(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes.iter().copied());
    }

    pub fn pending_rx(&self) -> usize {
        self.state.lock().rx.len()
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().tx.clone()
    }

    pub fn set_tx_ready(&self, ready: bool) {
        self.state.lock().tx_ready = ready;
    }

    pub fn rts(&self) -> bool {
        self.state.lock().rts
    }

    pub fn rx_interrupt(&self) -> bool {
        self.state.lock().rx_interrupt
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&MockSerialState) -> R) -> R {
        f(&self.state.lock())
    }
}

impl SerialPort for MockSerial {
    fn is_readable(&self) -> bool {
        !self.state.lock().rx.is_empty()
    }

    fn read_byte(&mut self) -> u8 {
        self.state.lock().rx.pop_front().unwrap_or(0)
    }

    fn is_writable(&self) -> bool {
        self.state.lock().tx_ready
    }

    fn write_byte(&mut self, byte: u8) {
        self.state.lock().tx.push(byte);
    }

    fn set_rts(&mut self, asserted: bool) {
        let mut s = self.state.lock();
        if s.rts && !asserted {
            s.rts_drops += 1;
        }
        s.rts = asserted;
    }

    fn set_rx_interrupt(&mut self, enabled: bool) {
        self.state.lock().rx_interrupt = enabled;
    }

    fn set_baudrate(&mut self, baud: u32) -> u32 {
        // Pretend the divider lands one bit per second high
        let actual = baud + 1;
        self.state.lock().baud = actual;
        actual
    }

    fn set_format(&mut self, data_bits: u8, stop_bits: u8, parity: Parity) {
        let mut s = self.state.lock();
        s.data_bits = data_bits;
        s.stop_bits = stop_bits;
        s.parity = parity;
    }

    fn set_hw_flow(&mut self, cts: bool, rts: bool) {
        let mut s = self.state.lock();
        s.cts_flow = cts;
        s.rts_flow = rts;
    }
}
