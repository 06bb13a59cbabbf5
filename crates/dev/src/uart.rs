//! TEAM_474: Interrupt-driven UART character device
//!
//! Received bytes move from the hardware FIFO into a ring buffer inside an
//! [`IrqSafeLock`], either from the receive interrupt or, in polled mode, from
//! the reader itself. When the ring fills, RTS is dropped and the receive
//! interrupt masked so the peer stops sending; the next `read` turns both
//! back on.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pfs_hal::{Clock, Deadline, IrqSafeLock, SerialPort};
use pfs_utils::RingBuffer;
use pfs_vfs::ops::{FileOps, OpenFlags};
use pfs_vfs::{IoctlRequest, ModeFlags, ReadMode, SerialConfig, VfsError, VfsResult};

use crate::devfs::Device;
use crate::stream;

/// Receive buffer size. One slot stays empty, so 511 bytes are buffered.
pub const UART_RX_BUFFER: usize = 512;

/// Highest GPIO number on the package.
const MAX_PIN: u8 = 29;

/// Who moves bytes from the hardware FIFO into the ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxDelivery {
    /// The board wires the UART IRQ to [`UartDevice::on_interrupt`].
    Interrupt,
    /// `read` drains the FIFO itself while it waits.
    #[default]
    Polled,
}

/// Pin function offsets within a UART pin group.
#[derive(Debug, Clone, Copy)]
enum PinFunc {
    Tx = 0,
    Rx = 1,
    Cts = 2,
    Rts = 3,
}

/// True if `pin` can carry `func` for UART `uart`.
fn pin_valid(uart: u8, func: PinFunc, pin: u8) -> bool {
    if pin > MAX_PIN {
        return false;
    }
    let Some(base) = pin.checked_sub(func as u8) else {
        return false;
    };
    match uart {
        0 => matches!(base, 0 | 12 | 16 | 28),
        1 => matches!(base, 4 | 8 | 20 | 24),
        _ => false,
    }
}

/// Board-level setup for one UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Instance number, 0 or 1
    pub uart: u8,
    pub line: SerialConfig,
    pub tx: Option<u8>,
    pub rx: Option<u8>,
    /// A CTS pin turns on hardware flow control
    pub cts: Option<u8>,
    pub rts: Option<u8>,
}

impl UartConfig {
    /// UART0 on GPIO 0/1, 115200 8N1, no flow control pins.
    pub fn uart0_default() -> Self {
        Self {
            uart: 0,
            line: SerialConfig {
                baud: 115_200,
                ..SerialConfig::default()
            },
            tx: Some(0),
            rx: Some(1),
            cts: None,
            rts: None,
        }
    }

    pub fn validate(&self) -> VfsResult<()> {
        if self.uart > 1 || self.line.baud == 0 {
            return Err(VfsError::InvalidArgument);
        }
        self.line.validate()?;
        let pins = [
            (self.tx, PinFunc::Tx),
            (self.rx, PinFunc::Rx),
            (self.cts, PinFunc::Cts),
            (self.rts, PinFunc::Rts),
        ];
        for (pin, func) in pins {
            if let Some(pin) = pin {
                if !pin_valid(self.uart, func, pin) {
                    log::warn!("[UART{}] pin {} cannot be {:?}", self.uart, pin, func);
                    return Err(VfsError::InvalidArgument);
                }
            }
        }
        Ok(())
    }
}

struct UartState<H> {
    hw: H,
    ring: RingBuffer<u8, UART_RX_BUFFER>,
    mode: ReadMode,
    timeout_us: u64,
    throttled: bool,
}

impl<H: SerialPort> UartState<H> {
    /// Move bytes from the FIFO while there is room. Returns true when this
    /// call had to throttle the sender.
    fn drain(&mut self) -> bool {
        while !self.ring.is_full() && self.hw.is_readable() {
            let b = self.hw.read_byte();
            if self.mode.contains(ModeFlags::ECHO) {
                self.hw.write_blocking(b);
            }
            self.ring.push(b);
        }
        if self.ring.is_full() {
            self.hw.set_rts(false);
            self.hw.set_rx_interrupt(false);
            let newly = !self.throttled;
            self.throttled = true;
            return newly;
        }
        false
    }

    fn unthrottle(&mut self) {
        self.hw.set_rts(true);
        self.hw.set_rx_interrupt(true);
        self.throttled = false;
    }
}

pub struct UartDevice<H, C> {
    state: IrqSafeLock<UartState<H>>,
    clock: C,
    delivery: RxDelivery,
}

impl<H: SerialPort, C: Clock> UartDevice<H, C> {
    /// Wrap already configured hardware. Line mode, no timeout.
    pub fn new(hw: H, clock: C, delivery: RxDelivery) -> Self {
        Self {
            state: IrqSafeLock::new(UartState {
                hw,
                ring: RingBuffer::new(0),
                mode: ReadMode::line(),
                timeout_us: 0,
                throttled: false,
            }),
            clock,
            delivery,
        }
    }

    /// Validate `config`, program the line and flow control, and enable
    /// reception. Nothing touches the hardware if validation fails.
    pub fn configure(mut hw: H, clock: C, config: &UartConfig, delivery: RxDelivery) -> VfsResult<Self> {
        config.validate()?;
        let actual = hw.set_baudrate(config.line.baud);
        hw.set_format(config.line.data_bits, config.line.stop_bits, config.line.parity);
        hw.set_hw_flow(config.cts.is_some(), false);
        hw.set_rts(true);
        hw.set_rx_interrupt(true);
        log::info!("[UART{}] {} baud ({:?})", config.uart, actual, delivery);
        Ok(Self::new(hw, clock, delivery))
    }

    /// Receive interrupt entry point.
    pub fn on_interrupt(&self) {
        if self.state.lock().drain() {
            log::warn!("[UART] receive buffer full, RTS dropped");
        }
    }

    pub fn delivery(&self) -> RxDelivery {
        self.delivery
    }

    /// Blocking read following the current [`ReadMode`] and timeout.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let (mode, timeout_us) = {
            let s = self.state.lock();
            (s.mode, s.timeout_us)
        };
        let deadline = Deadline::after(&self.clock, timeout_us);
        self.on_interrupt();
        let polled = self.delivery == RxDelivery::Polled;
        let n = stream::read_into(
            buf,
            mode,
            deadline,
            &self.clock,
            || self.state.lock().ring.pop(),
            || {
                // A throttled sender has its interrupt masked, so nothing
                // else will move the FIFO.
                if polled || self.state.lock().throttled {
                    self.on_interrupt();
                }
            },
        );
        self.state.lock().unthrottle();
        n
    }

    /// TEAM_484: Returns once the hardware has taken every byte. The lock
    /// is only held to hand over a byte, never while waiting for TX space.
    pub fn write(&self, buf: &[u8]) -> usize {
        for &b in buf {
            loop {
                {
                    let mut s = self.state.lock();
                    if s.hw.is_writable() {
                        s.hw.write_byte(b);
                        break;
                    }
                }
                core::hint::spin_loop();
            }
        }
        buf.len()
    }

    pub fn ioctl(&self, request: IoctlRequest) -> VfsResult<usize> {
        let mut s = self.state.lock();
        match request {
            IoctlRequest::SetMode(mode) => s.mode = mode,
            IoctlRequest::Purge => s.ring.clear(),
            IoctlRequest::Count => return Ok(s.ring.len()),
            IoctlRequest::SetTimeout(us) => s.timeout_us = us,
            IoctlRequest::SerialConfig(cfg) => {
                cfg.validate()?;
                let actual = if cfg.baud == 0 {
                    0
                } else {
                    s.hw.set_baudrate(cfg.baud)
                };
                s.hw.set_format(cfg.data_bits, cfg.stop_bits, cfg.parity);
                return Ok(actual as usize);
            }
        }
        Ok(0)
    }

    pub fn mode(&self) -> ReadMode {
        self.state.lock().mode
    }
}

struct UartFile<H, C> {
    dev: Arc<UartDevice<H, C>>,
}

impl<H, C> FileOps for UartFile<H, C>
where
    H: SerialPort + 'static,
    C: Clock + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        Ok(self.dev.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        Ok(self.dev.write(buf))
    }

    fn ioctl(&mut self, request: IoctlRequest) -> VfsResult<usize> {
        self.dev.ioctl(request)
    }
}

impl<H, C> Device for UartDevice<H, C>
where
    H: SerialPort + 'static,
    C: Clock + 'static,
{
    fn open(self: Arc<Self>, _name: &str, _flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        Ok(Box::new(UartFile { dev: self }))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
