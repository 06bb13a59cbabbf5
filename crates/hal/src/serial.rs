// TEAM_463: Hardware surface of a flow-controlled UART.
// Character devices are generic over this trait so the interrupt and read
// paths run unchanged against the PL011 driver or a host mock.

/// Parity setting for the line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

pub trait SerialPort: Send {
    /// Receive FIFO holds at least one byte.
    fn is_readable(&self) -> bool;

    /// Pop one byte from the receive FIFO. Only valid after `is_readable`.
    fn read_byte(&mut self) -> u8;

    /// Transmit FIFO has room for one byte.
    fn is_writable(&self) -> bool;

    /// Push one byte into the transmit FIFO. Only valid after `is_writable`.
    fn write_byte(&mut self, byte: u8);

    /// Drive the RTS output. Deasserting tells the peer to stop sending.
    fn set_rts(&mut self, asserted: bool);

    /// Mask or unmask the receive interrupt.
    fn set_rx_interrupt(&mut self, enabled: bool);

    /// Program the divisors for `baud` and return the rate actually achieved.
    fn set_baudrate(&mut self, baud: u32) -> u32;

    /// Configure word length (5..=8), stop bits (1..=2) and parity.
    /// Callers validate the ranges.
    fn set_format(&mut self, data_bits: u8, stop_bits: u8, parity: Parity);

    /// Enable hardware flow control on the CTS input and/or RTS output.
    fn set_hw_flow(&mut self, cts: bool, rts: bool);

    /// Wait for room in the transmit FIFO, then send.
    fn write_blocking(&mut self, byte: u8) {
        while !self.is_writable() {
            core::hint::spin_loop();
        }
        self.write_byte(byte);
    }
}
