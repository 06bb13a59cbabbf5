//! TEAM_475: Generic buffered input device
//!
//! Board code pushes bytes with [`GioDevice::input`], typically from its own
//! interrupt handler, and applications read them through `/dev` with the same
//! read discipline as the UART. An optional output routine makes the device
//! writable and is used for echo.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pfs_hal::{Clock, Deadline, IrqSafeLock};
use pfs_utils::RingBuffer;
use pfs_vfs::ops::{AccessMode, FileOps, OpenFlags};
use pfs_vfs::{IoctlRequest, ModeFlags, ReadMode, VfsError, VfsResult};

use crate::devfs::Device;
use crate::{OutputFn, stream};

/// Result of handing one byte to [`GioDevice::input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    Accepted,
    /// Stored, and the buffer has no room left
    NowFull,
    /// Buffer was already full, byte dropped
    Rejected,
}

struct GioState<const N: usize> {
    ring: RingBuffer<u8, N>,
    mode: ReadMode,
    timeout_us: u64,
}

pub struct GioDevice<C, const N: usize> {
    state: IrqSafeLock<GioState<N>>,
    output: Option<OutputFn>,
    clock: C,
}

impl<C: Clock, const N: usize> GioDevice<C, N> {
    pub fn new(clock: C, output: Option<OutputFn>) -> Self {
        Self {
            state: IrqSafeLock::new(GioState {
                ring: RingBuffer::new(0),
                mode: ReadMode::line(),
                timeout_us: 0,
            }),
            output,
            clock,
        }
    }

    /// Producer side. Safe to call from interrupt context.
    pub fn input(&self, byte: u8) -> InputStatus {
        let mut s = self.state.lock();
        if s.ring.is_full() {
            return InputStatus::Rejected;
        }
        if s.mode.contains(ModeFlags::ECHO) {
            if let Some(out) = &self.output {
                out(byte);
            }
        }
        s.ring.push(byte);
        if s.ring.is_full() {
            InputStatus::NowFull
        } else {
            InputStatus::Accepted
        }
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn read(&self, buf: &mut [u8]) -> usize {
        let (mode, timeout_us) = {
            let s = self.state.lock();
            (s.mode, s.timeout_us)
        };
        let deadline = Deadline::after(&self.clock, timeout_us);
        stream::read_into(
            buf,
            mode,
            deadline,
            &self.clock,
            || self.state.lock().ring.pop(),
            || {},
        )
    }

    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        let out = self.output.as_ref().ok_or(VfsError::AccessDenied)?;
        buf.iter().for_each(|&b| out(b));
        Ok(buf.len())
    }

    pub fn ioctl(&self, request: IoctlRequest) -> VfsResult<usize> {
        let mut s = self.state.lock();
        match request {
            IoctlRequest::SetMode(mode) => s.mode = mode,
            IoctlRequest::Purge => s.ring.clear(),
            IoctlRequest::Count => return Ok(s.ring.len()),
            IoctlRequest::SetTimeout(us) => s.timeout_us = us,
            IoctlRequest::SerialConfig(_) => return Err(VfsError::NotSupported),
        }
        Ok(0)
    }
}

struct GioFile<C, const N: usize> {
    dev: Arc<GioDevice<C, N>>,
}

impl<C: Clock + 'static, const N: usize> FileOps for GioFile<C, N> {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        Ok(self.dev.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.dev.write(buf)
    }

    fn ioctl(&mut self, request: IoctlRequest) -> VfsResult<usize> {
        self.dev.ioctl(request)
    }
}

impl<C: Clock + 'static, const N: usize> Device for GioDevice<C, N> {
    fn open(self: Arc<Self>, name: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        if flags.access()? != AccessMode::Read && self.output.is_none() {
            log::debug!("[GIO] {} has no output, write access refused", name);
            return Err(VfsError::AccessDenied);
        }
        Ok(Box::new(GioFile { dev: self }))
    }
}
