#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! TEAM_483: Board-facing entry points.
//!
//! A board brings the shim up once with [`init`], registers its character
//! devices with [`mknod`], mounts backends with [`mount`] and finally points
//! stdin, stdout and stderr at a console with [`bind_console`] or
//! [`bind_stdio`]. From then on the C library reaches everything through
//! [`posix`].
//!
//! ```ignore
//! pfs::init_logging(&CONSOLE, LevelFilter::Info)?;
//! pfs::init();
//! pfs::mknod("uart0", 0, uart.clone())?;
//! pfs::mount(pfs::dev_fetch(), "/dev")?;
//! pfs::mount(Arc::new(FlashFs::create(engine, cfg)?), "/flash")?;
//! pfs::bind_stdio("/dev/uart0")?;
//! ```

extern crate alloc;

pub mod posix;

use alloc::sync::Arc;

use pfs_utils::{Lazy, Once};
use pfs_vfs::fd::{STDERR, STDIN, STDOUT};

pub use pfs_dev::{
    ConsoleIo, Device, DeviceFs, GddDevice, GioDevice, InputStatus, OutputFn, RxDelivery,
    TtyDevice, UartConfig, UartDevice,
};
pub use pfs_fat::{BlockMedia, DateTime, FatFs, MediaStatus, NoRtc, Rtc};
pub use pfs_flash::{FlashConfig, FlashFs, Lfs};
pub use pfs_hal::logger::LogSink;
pub use pfs_hal::{Clock, Parity, SerialPort};
pub use pfs_vfs::{
    DirEntry, FileHandle, FileType, Filesystem, IoctlRequest, ModeFlags, OpenFlags, ReadMode,
    SeekWhence, SerialConfig, Stat, VFS, Vfs, VfsError, VfsResult,
};

static INIT: Once<()> = Once::new();

/// Descriptor and access mode of each standard stream.
const STDIO: [(usize, u32); 3] = [
    (STDIN, OpenFlags::O_RDONLY),
    (STDOUT, OpenFlags::O_WRONLY),
    (STDERR, OpenFlags::O_WRONLY),
];

/// Bring up the dispatch layer. Later calls do nothing.
pub fn init() {
    INIT.call_once(|| {
        Lazy::force(&VFS);
        log::info!("[PFS] virtual filesystem ready");
    });
}

/// Route `log` output to `sink`, typically the console UART. Only the first
/// call can install a logger.
pub fn init_logging(
    sink: &'static dyn LogSink,
    level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    pfs_hal::logger::init(sink, level)
}

/// Attach `fs` at `name` (`"/"`, `"/sd"`, `"/dev"`, ...).
pub fn mount(fs: Arc<dyn Filesystem>, name: &str) -> VfsResult<()> {
    init();
    VFS.mount(name, fs)
}

/// Detach the backend at `name`. Fails with `Busy` while handles are open.
pub fn unmount(name: &str) -> VfsResult<()> {
    VFS.unmount(name)
}

/// The device filesystem, for mounting at `/dev`.
pub fn dev_fetch() -> Arc<DeviceFs> {
    pfs_dev::devfs::fetch()
}

/// Register `device` in the device filesystem. A trailing `*` in `name`
/// matches any name with that prefix.
pub fn mknod(name: &str, mode: u32, device: Arc<dyn Device>) -> VfsResult<()> {
    dev_fetch()
        .mknod(name, mode, device)
        .inspect_err(|e| VFS.set_error(*e))
}

/// Open `path` once per standard stream and bind the handles to
/// descriptors 0, 1 and 2.
pub fn bind_stdio(path: &str) -> VfsResult<()> {
    init();
    for (fd, access) in STDIO {
        let handle = VFS.open(path, OpenFlags::new(access))?;
        VFS.install_fd(fd, handle)?;
    }
    log::info!("[PFS] stdio bound to {}", path);
    Ok(())
}

/// Bind the standard streams straight to `console`, without going through
/// a mount. Used before `/dev` exists.
pub fn bind_console(console: &Arc<dyn Device>) -> VfsResult<()> {
    init();
    for (fd, access) in STDIO {
        let ops = console
            .clone()
            .open("console", OpenFlags::new(access))
            .inspect_err(|e| VFS.set_error(*e))?;
        VFS.install_fd(fd, FileHandle::detached(ops))?;
    }
    Ok(())
}
