//! TEAM_475: Console terminal device
//!
//! Thin adapter from a board console (USB CDC, semihosting, a second UART)
//! to a file. Reads block until every requested byte arrived; there is no
//! line discipline.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pfs_vfs::ops::{FileOps, OpenFlags};
use pfs_vfs::VfsResult;

use crate::devfs::Device;

/// Byte-level console provided by the board.
pub trait ConsoleIo: Send + Sync {
    /// Next input byte, if one is ready.
    fn getc(&self) -> Option<u8>;
    fn putc(&self, byte: u8);
}

pub struct TtyDevice<T> {
    io: T,
}

impl<T: ConsoleIo> TtyDevice<T> {
    pub fn new(io: T) -> Self {
        Self { io }
    }

    fn getc_blocking(&self) -> u8 {
        loop {
            if let Some(b) = self.io.getc() {
                return b;
            }
            core::hint::spin_loop();
        }
    }
}

struct TtyFile<T> {
    dev: Arc<TtyDevice<T>>,
}

impl<T: ConsoleIo + 'static> FileOps for TtyFile<T> {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        for slot in buf.iter_mut() {
            *slot = self.dev.getc_blocking();
        }
        Ok(buf.len())
    }

    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        for &b in buf {
            self.dev.io.putc(b);
        }
        Ok(buf.len())
    }

    fn isatty(&self) -> bool {
        true
    }
}

impl<T: ConsoleIo + 'static> Device for TtyDevice<T> {
    fn open(self: Arc<Self>, _name: &str, _flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        Ok(Box::new(TtyFile { dev: self }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::vec::Vec;

    #[derive(Default)]
    struct Loop {
        input: Mutex<VecDeque<u8>>,
        output: Mutex<Vec<u8>>,
    }

    impl ConsoleIo for Loop {
        fn getc(&self) -> Option<u8> {
            self.input.lock().unwrap().pop_front()
        }

        fn putc(&self, byte: u8) {
            self.output.lock().unwrap().push(byte);
        }
    }

    #[test]
    fn test_tty_round_trip() {
        let console = Loop::default();
        console.input.lock().unwrap().extend(b"abc");
        let dev = Arc::new(TtyDevice::new(console));
        let mut file = dev.clone().open("tty", OpenFlags::new(OpenFlags::O_RDWR)).unwrap();

        assert!(file.isatty());
        let mut buf = [0u8; 3];
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");

        file.write(b"\r\n").unwrap();
        assert_eq!(*dev.io.output.lock().unwrap(), b"\r\n");
    }

    #[test]
    fn test_read_waits_for_input() {
        use std::thread;
        use std::time::Duration;

        let dev = Arc::new(TtyDevice::new(Loop::default()));
        let feeder = dev.clone();
        let h = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            feeder.io.input.lock().unwrap().push_back(b'!');
        });
        let mut file = dev.open("tty", OpenFlags::new(OpenFlags::O_RDONLY)).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'!');
        h.join().unwrap();
    }
}
