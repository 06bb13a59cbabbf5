// TEAM_463: PL011 UART driver (as found on the RP2040).
// Register layout and bit positions follow the ARM PrimeCell PL011 TRM.

use crate::serial::{Parity, SerialPort};
use bitflags::bitflags;
use core::ptr::{read_volatile, write_volatile};

bitflags! {
    /// Flag register bits (FR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlagFlags: u32 {
        /// UART busy.
        const BUSY = 1 << 3;
        /// Receive FIFO empty (bit 4).
        const RXFE = 1 << 4;
        /// Transmit FIFO full (bit 5).
        const TXFF = 1 << 5;
    }
}

bitflags! {
    /// Control register bits (CR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u32 {
        const UARTEN = 1 << 0;
        const TXE    = 1 << 8;
        const RXE    = 1 << 9;
        /// Request to send, inverted onto the nUARTRTS pin.
        const RTS    = 1 << 11;
        /// Hardware RTS flow control.
        const RTSEN  = 1 << 14;
        /// Hardware CTS flow control.
        const CTSEN  = 1 << 15;
    }
}

bitflags! {
    /// Line Control register bits (LCR_H).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineControlFlags: u32 {
        const PEN    = 1 << 1;
        const EPS    = 1 << 2;
        const STP2   = 1 << 3;
        const FEN    = 1 << 4;
        /// Word length field (bits 5-6), value = data bits - 5.
        const WLEN   = 0b11 << 5;
    }
}

bitflags! {
    /// Interrupt Mask Set/Clear register (IMSC).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptFlags: u32 {
        const RXIM = 1 << 4;
        const TXIM = 1 << 5;
        const RTIM = 1 << 6;
    }
}

const WLEN_SHIFT: u32 = 5;

#[repr(transparent)]
struct Reg<T>(T);

impl<T> Reg<T> {
    fn read(&self) -> T {
        unsafe { read_volatile(&self.0) }
    }
    fn write(&mut self, val: T) {
        unsafe { write_volatile(&mut self.0, val) }
    }
}

#[repr(C)]
struct Registers {
    dr: Reg<u32>,     // 0x00
    rsr: Reg<u32>,    // 0x04
    _reserved0: [u32; 4],
    fr: Reg<u32>, // 0x18
    _reserved1: u32,
    ilpr: Reg<u32>,  // 0x20
    ibrd: Reg<u32>,  // 0x24
    fbrd: Reg<u32>,  // 0x28
    lcr_h: Reg<u32>, // 0x2C
    cr: Reg<u32>,    // 0x30
    ifls: Reg<u32>,  // 0x34
    imsc: Reg<u32>,  // 0x38
    ris: Reg<u32>,   // 0x3C
    mis: Reg<u32>,   // 0x40
    icr: Reg<u32>,   // 0x44
}

/// Integer and fractional divisors for `baud` at `clock_hz`, plus the rate
/// they produce.
pub fn baud_divisors(clock_hz: u32, baud: u32) -> (u32, u32, u32) {
    let div = (8 * u64::from(clock_hz)) / u64::from(baud.max(1));
    let (ibrd, fbrd) = match div >> 7 {
        0 => (1, 0),
        i if i >= 65535 => (65535, 0),
        i => (i as u32, (((div & 0x7F) + 1) / 2) as u32),
    };
    let actual = (4 * u64::from(clock_hz)) / u64::from(64 * ibrd + fbrd);
    (ibrd, fbrd, actual as u32)
}

pub struct Pl011Uart {
    base: usize,
    clock_hz: u32,
}

impl Pl011Uart {
    /// # Safety
    /// `base` must be the address of a PL011 register block that stays
    /// mapped for the lifetime of the driver and is not aliased.
    pub const unsafe fn new(base: usize, clock_hz: u32) -> Self {
        Self { base, clock_hz }
    }

    fn regs(&self) -> &Registers {
        unsafe { &*(self.base as *const Registers) }
    }

    fn regs_mut(&mut self) -> &mut Registers {
        unsafe { &mut *(self.base as *mut Registers) }
    }

    fn flags(&self) -> FlagFlags {
        FlagFlags::from_bits_truncate(self.regs().fr.read())
    }

    fn update_cr(&mut self, f: impl FnOnce(&mut ControlFlags)) {
        let mut cr = ControlFlags::from_bits_retain(self.regs().cr.read());
        f(&mut cr);
        self.regs_mut().cr.write(cr.bits());
    }

    /// 8N1 with FIFOs, RTS asserted, receive and timeout interrupts unmasked.
    pub fn init(&mut self, baud: u32) -> u32 {
        self.regs_mut().cr.write(0);
        self.regs_mut().icr.write(0x7FF);
        let actual = self.set_baudrate(baud);
        self.set_format(8, 1, Parity::None);
        self.regs_mut().cr.write(
            (ControlFlags::UARTEN | ControlFlags::TXE | ControlFlags::RXE | ControlFlags::RTS)
                .bits(),
        );
        self.regs_mut()
            .imsc
            .write((InterruptFlags::RXIM | InterruptFlags::RTIM).bits());
        actual
    }

    /// Acknowledge every pending interrupt source.
    pub fn clear_interrupts(&mut self) {
        self.regs_mut().icr.write(0x7FF);
    }
}

impl SerialPort for Pl011Uart {
    fn is_readable(&self) -> bool {
        !self.flags().contains(FlagFlags::RXFE)
    }

    fn read_byte(&mut self) -> u8 {
        self.regs().dr.read() as u8
    }

    fn is_writable(&self) -> bool {
        !self.flags().contains(FlagFlags::TXFF)
    }

    fn write_byte(&mut self, byte: u8) {
        self.regs_mut().dr.write(u32::from(byte));
    }

    fn set_rts(&mut self, asserted: bool) {
        self.update_cr(|cr| cr.set(ControlFlags::RTS, asserted));
    }

    fn set_rx_interrupt(&mut self, enabled: bool) {
        let mut imsc = InterruptFlags::from_bits_retain(self.regs().imsc.read());
        imsc.set(InterruptFlags::RXIM | InterruptFlags::RTIM, enabled);
        self.regs_mut().imsc.write(imsc.bits());
    }

    fn set_baudrate(&mut self, baud: u32) -> u32 {
        let (ibrd, fbrd, actual) = baud_divisors(self.clock_hz, baud);
        self.regs_mut().ibrd.write(ibrd);
        self.regs_mut().fbrd.write(fbrd);
        // Divisors latch on the next LCR_H write
        let lcr = self.regs().lcr_h.read();
        self.regs_mut().lcr_h.write(lcr);
        actual
    }

    fn set_format(&mut self, data_bits: u8, stop_bits: u8, parity: Parity) {
        let mut lcr = LineControlFlags::FEN;
        lcr |= LineControlFlags::from_bits_retain(
            (u32::from(data_bits.clamp(5, 8)) - 5) << WLEN_SHIFT,
        );
        if stop_bits == 2 {
            lcr |= LineControlFlags::STP2;
        }
        match parity {
            Parity::None => {}
            Parity::Even => lcr |= LineControlFlags::PEN | LineControlFlags::EPS,
            Parity::Odd => lcr |= LineControlFlags::PEN,
        }
        self.regs_mut().lcr_h.write(lcr.bits());
    }

    fn set_hw_flow(&mut self, cts: bool, rts: bool) {
        self.update_cr(|cr| {
            cr.set(ControlFlags::CTSEN, cts);
            cr.set(ControlFlags::RTSEN, rts);
        });
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FR: usize = 0x18 / 4;
    const IBRD: usize = 0x24 / 4;
    const FBRD: usize = 0x28 / 4;
    const LCR_H: usize = 0x2C / 4;
    const CR: usize = 0x30 / 4;
    const IMSC: usize = 0x38 / 4;

    /// Plain memory standing in for the register block.
    fn fake_uart(regs: &mut [u32; 18]) -> Pl011Uart {
        unsafe { Pl011Uart::new(regs.as_mut_ptr() as usize, 125_000_000) }
    }

    #[test]
    fn test_flag_bit_positions() {
        assert_eq!(FlagFlags::TXFF.bits(), 1 << 5);
        assert_eq!(FlagFlags::RXFE.bits(), 1 << 4);
        assert_eq!(ControlFlags::RTS.bits(), 1 << 11);
        assert_eq!(ControlFlags::CTSEN.bits(), 1 << 15);
        assert_eq!(InterruptFlags::RXIM.bits(), 1 << 4);
        assert_eq!(LineControlFlags::WLEN.bits(), 0x60);
    }

    #[test]
    fn test_baud_divisors() {
        assert_eq!(baud_divisors(125_000_000, 115_200), (67, 52, 115_207));
        // Too slow clamps to the largest divisor
        assert_eq!(baud_divisors(125_000_000, 1).0, 65535);
        // Too fast clamps to the smallest
        assert_eq!(baud_divisors(125_000_000, 100_000_000).0, 1);
    }

    #[test]
    fn test_set_baudrate_programs_divisors() {
        let mut regs = [0u32; 18];
        let mut uart = fake_uart(&mut regs);
        assert_eq!(uart.set_baudrate(115_200), 115_207);
        drop(uart);
        assert_eq!(regs[IBRD], 67);
        assert_eq!(regs[FBRD], 52);
    }

    #[test]
    fn test_set_format() {
        let mut regs = [0u32; 18];
        let mut uart = fake_uart(&mut regs);
        uart.set_format(7, 2, Parity::Even);
        drop(uart);
        let lcr = LineControlFlags::from_bits_retain(regs[LCR_H]);
        assert_eq!((lcr.bits() & LineControlFlags::WLEN.bits()) >> WLEN_SHIFT, 2);
        assert!(lcr.contains(LineControlFlags::STP2 | LineControlFlags::PEN | LineControlFlags::EPS));
        assert!(lcr.contains(LineControlFlags::FEN));
    }

    #[test]
    fn test_flow_control_bits() {
        let mut regs = [0u32; 18];
        let mut uart = fake_uart(&mut regs);
        uart.init(115_200);
        uart.set_rts(false);
        uart.set_rx_interrupt(false);
        uart.set_hw_flow(true, false);
        drop(uart);
        let cr = ControlFlags::from_bits_retain(regs[CR]);
        assert!(!cr.contains(ControlFlags::RTS));
        assert!(cr.contains(ControlFlags::CTSEN | ControlFlags::UARTEN));
        assert!(!cr.contains(ControlFlags::RTSEN));
        assert_eq!(regs[IMSC] & InterruptFlags::RXIM.bits(), 0);
    }

    #[test]
    fn test_fifo_status() {
        let mut regs = [0u32; 18];
        regs[FR] = (FlagFlags::RXFE | FlagFlags::TXFF).bits();
        let mut uart = fake_uart(&mut regs);
        assert!(!uart.is_readable());
        assert!(!uart.is_writable());
        uart.regs_mut().fr.write(0);
        uart.regs_mut().dr.write(u32::from(b'x'));
        assert!(uart.is_readable());
        assert_eq!(uart.read_byte(), b'x');
    }
}
