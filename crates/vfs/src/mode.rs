//! TEAM_467: POSIX file mode constants for `Stat::mode`.
//!
//! There is no permission model: backends report a fixed `rwx` for everyone.

/// Bit mask for extracting file type
pub const S_IFMT: u32 = 0o170000;
/// Regular file
pub const S_IFREG: u32 = 0o100000;
/// Directory
pub const S_IFDIR: u32 = 0o040000;
/// Character device
pub const S_IFCHR: u32 = 0o020000;

/// Read, write and execute for owner, group and others
pub const S_IRWXUGO: u32 = 0o777;

pub fn is_dir(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFDIR
}

pub fn is_reg(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFREG
}

pub fn is_chr(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFCHR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_checks() {
        assert!(is_dir(S_IFDIR | S_IRWXUGO));
        assert!(is_reg(S_IFREG | 0o644));
        assert!(is_chr(S_IFCHR));
        assert!(!is_dir(S_IFREG));
    }
}
