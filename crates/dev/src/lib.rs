#![cfg_attr(not(any(test, feature = "std")), no_std)]

// TEAM_472: Device filesystem and character device drivers.
// Devices register under a name with `mknod` and are opened through the
// `/dev` mount like files. Input devices share one read discipline
// (`stream`) on top of a ring buffer guarded by an IrqSafeLock.

extern crate alloc;

pub mod devfs;
pub mod gdd;
pub mod gio;
pub mod stream;
pub mod tty;
pub mod uart;

pub use devfs::{Device, DeviceFs};
pub use gio::{GioDevice, InputStatus};
pub use gdd::GddDevice;
pub use tty::{ConsoleIo, TtyDevice};
pub use uart::{RxDelivery, UART_RX_BUFFER, UartConfig, UartDevice};

/// Byte sink used by output-capable devices.
pub type OutputFn = alloc::boxed::Box<dyn Fn(u8) + Send + Sync>;
