// TEAM_475: Output-only device. Every written byte goes to one routine,
// e.g. a display or a GPIO bank driven a byte at a time.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pfs_vfs::ops::{AccessMode, FileOps, OpenFlags};
use pfs_vfs::{VfsError, VfsResult};

use crate::OutputFn;
use crate::devfs::Device;

pub struct GddDevice {
    output: OutputFn,
}

impl GddDevice {
    pub fn new(output: OutputFn) -> Self {
        Self { output }
    }
}

struct GddFile {
    dev: Arc<GddDevice>,
}

impl FileOps for GddFile {
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        buf.iter().for_each(|&b| (self.dev.output)(b));
        Ok(buf.len())
    }
}

impl Device for GddDevice {
    fn open(self: Arc<Self>, _name: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileOps>> {
        if flags.access()? != AccessMode::Write {
            return Err(VfsError::AccessDenied);
        }
        Ok(Box::new(GddFile { dev: self }))
    }
}
