//! TEAM_460: Error handling infrastructure shared by every pfs crate.
//!
//! Provides the `define_fs_error!` macro for subsystem error enums and the
//! POSIX errno numbers those enums report through `errno()`.
//!
//! ## Usage
//!
//! ### Simple errors
//! ```ignore
//! define_fs_error! {
//!     pub enum MediaError(0x02) {
//!         NotReady = 0x01, EIO => "Media not ready",
//!         Parameter = 0x02, EINVAL => "Bad sector request",
//!     }
//! }
//! ```
//!
//! ### Nested errors
//! A nested variant without an explicit errno reports the errno of the error
//! it wraps.
//! ```ignore
//! define_fs_error! {
//!     pub enum FatError(0x03) {
//!         Media(MediaError) = 0x01 => "Media failure",
//!     }
//! }
//! ```

#![no_std]

/// POSIX errno values used by the last-error convention.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const ENXIO: i32 = 6;
    pub const EBADF: i32 = 9;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const EXDEV: i32 = 18;
    pub const ENODEV: i32 = 19;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENFILE: i32 = 23;
    pub const EMFILE: i32 = 24;
    pub const ENOTTY: i32 = 25;
    pub const EFBIG: i32 = 27;
    pub const ENOSPC: i32 = 28;
    pub const ESPIPE: i32 = 29;
    pub const EROFS: i32 = 30;
    pub const ENAMETOOLONG: i32 = 36;
    pub const ENOTEMPTY: i32 = 39;
    pub const ENODATA: i32 = 61;
    pub const EOPNOTSUPP: i32 = 95;
    pub const ETIMEDOUT: i32 = 110;
}

/// Define a subsystem error enum with numeric codes, errno mapping and
/// `Display`.
///
/// Codes are `(subsystem << 8) | variant`. Variants may wrap an inner error.
#[macro_export]
macro_rules! define_fs_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal $(, $errno:ident)? => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Numeric error code, unique across subsystems.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_fs_error!(@pattern $variant $(($inner))? _unused) => {
                            (($subsystem as u16) << 8) | $code
                        }
                    )*
                }
            }

            /// Human readable description.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_fs_error!(@pattern $variant $(($inner))? _unused) => $desc,
                    )*
                }
            }

            /// Positive POSIX errno for the last-error convention.
            #[allow(unused_variables)]
            pub const fn errno(&self) -> i32 {
                match self {
                    $(
                        $crate::define_fs_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_fs_error!(@errno inner $(($inner))? $($errno)?)
                        }
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_fs_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_fs_error!(@display self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    (@errno $bind:ident ($inner:ty) $errno:ident) => { $crate::errno::$errno };
    (@errno $bind:ident ($inner:ty)) => { $bind.errno() };
    (@errno $bind:ident $errno:ident) => { $crate::errno::$errno };
    (@errno $bind:ident) => { $crate::errno::EIO };

    (@display $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}
