//! TEAM_467: Device control requests.
//!
//! Character devices share one read discipline, configured through
//! [`IoctlRequest::SetMode`]. The raw `u32` encoding of [`ReadMode`] keeps
//! the terminator byte in the low 8 bits and the flags above it.

use bitflags::bitflags;
use pfs_hal::Parity;

use crate::error::{VfsError, VfsResult};

bitflags! {
    /// How a character device read decides when to stop.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        /// Return immediately when nothing is buffered.
        const NBLOCK = 1 << 8;
        /// Return as soon as at least one byte was delivered.
        const ANY    = 1 << 9;
        /// Stop after the terminator byte.
        const CHR    = 1 << 10;
        /// Deliver the terminator as `\n`.
        const TLF    = 1 << 11;
        /// Echo received bytes back to the sender.
        const ECHO   = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMode {
    pub flags: ModeFlags,
    pub terminator: u8,
}

impl ReadMode {
    pub const fn new(flags: ModeFlags, terminator: u8) -> Self {
        Self { flags, terminator }
    }

    /// Line mode: stop at carriage return and hand it over as `\n`.
    pub const fn line() -> Self {
        Self::new(ModeFlags::CHR.union(ModeFlags::TLF), b'\r')
    }

    /// Plain blocking byte stream.
    pub const fn raw() -> Self {
        Self::new(ModeFlags::empty(), 0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self {
            flags: ModeFlags::from_bits_truncate(bits),
            terminator: (bits & 0xFF) as u8,
        }
    }

    pub const fn bits(&self) -> u32 {
        self.flags.bits() | self.terminator as u32
    }

    pub fn contains(&self, flags: ModeFlags) -> bool {
        self.flags.contains(flags)
    }

    /// True when `byte` ends a terminator-mode read.
    pub fn is_terminator(&self, byte: u8) -> bool {
        self.flags.contains(ModeFlags::CHR) && byte == self.terminator
    }
}

impl Default for ReadMode {
    fn default() -> Self {
        Self::line()
    }
}

/// Line settings for a serial device. `baud == 0` leaves the rate alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl SerialConfig {
    pub const fn new(baud: u32, data_bits: u8, stop_bits: u8, parity: Parity) -> Self {
        Self {
            baud,
            data_bits,
            stop_bits,
            parity,
        }
    }

    pub fn validate(&self) -> VfsResult<()> {
        if !(5..=8).contains(&self.data_bits) || !(1..=2).contains(&self.stop_bits) {
            return Err(VfsError::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(0, 8, 1, Parity::None)
    }
}

/// Control request forwarded to a file's `ioctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlRequest {
    SetMode(ReadMode),
    /// Discard everything buffered.
    Purge,
    /// Number of buffered bytes.
    Count,
    /// Read timeout in microseconds, 0 waits forever.
    SetTimeout(u64),
    /// Reconfigure the line. Replies with the achieved baud rate.
    SerialConfig(SerialConfig),
}
