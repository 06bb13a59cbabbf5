//! TEAM_468: Mount Table
//!
//! Maps canonical mount-point paths to backend instances.
//!
//! Key features:
//! - Longest-prefix resolution on whole path segments
//! - The root mount point (if any) catches everything else
//! - Unmount refuses while open handles still reference the mount

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use pfs_utils::HashMap;

use crate::error::{VfsError, VfsResult};
use crate::ops::Filesystem;
use crate::path::PathList;

/// A mounted backend. Open handles keep an `Arc` to it.
pub struct Mount {
    /// Canonical mount point, e.g. `/` or `/sd`
    pub mountpoint: String,
    pub fs: Arc<dyn Filesystem>,
}

impl Mount {
    pub fn is_root(&self) -> bool {
        self.mountpoint == "/"
    }
}

impl core::fmt::Debug for Mount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mount")
            .field("mountpoint", &self.mountpoint)
            .field("fs", &self.fs.name())
            .finish()
    }
}

#[derive(Default)]
pub struct MountTable {
    mounts: HashMap<String, Arc<Mount>>,
}

/// Canonical text for a mount-point name. A missing leading slash is assumed.
pub fn canonical_mountpoint(name: &str) -> VfsResult<String> {
    let mut list = PathList::root();
    list.join(PathList::parse(name)?)?;
    list.render()
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            mounts: HashMap::new(),
        }
    }

    pub fn mount(&mut self, mountpoint: &str, fs: Arc<dyn Filesystem>) -> VfsResult<Arc<Mount>> {
        let mountpoint = canonical_mountpoint(mountpoint)?;
        if self.mounts.contains_key(&mountpoint) {
            return Err(VfsError::AlreadyMounted);
        }
        self.mounts.try_reserve(1).map_err(|_| VfsError::OutOfMemory)?;
        let mount = Arc::new(Mount {
            mountpoint: mountpoint.clone(),
            fs,
        });
        self.mounts.insert(mountpoint, mount.clone());
        Ok(mount)
    }

    /// Remove a mount. Fails with `Busy` while any handle holds it.
    pub fn unmount(&mut self, mountpoint: &str) -> VfsResult<Arc<Mount>> {
        let mountpoint = canonical_mountpoint(mountpoint)?;
        let mount = self.mounts.get(&mountpoint).ok_or(VfsError::NoSuchMount)?;
        if Arc::strong_count(mount) > 1 {
            return Err(VfsError::Busy);
        }
        self.mounts.remove(&mountpoint).ok_or(VfsError::NoSuchMount)
    }

    /// Find the mount covering an absolute path and the path left inside it.
    ///
    /// Prefixes are tried from the full path down to `/`, so `/sd/x` goes to
    /// `/sd` before `/` and `/sdx` never matches `/sd`.
    pub fn resolve(&self, path: &PathList) -> VfsResult<(Arc<Mount>, String)> {
        let names: Vec<&str> = path.names().collect();
        let mut key = String::new();
        for depth in (0..=names.len()).rev() {
            key.clear();
            for name in &names[..depth] {
                key.try_reserve(name.len() + 1)?;
                key.push('/');
                key.push_str(name);
            }
            if key.is_empty() {
                key.push('/');
            }
            if let Some(mount) = self.mounts.get(&key) {
                let mut rest = String::new();
                for (i, name) in names[depth..].iter().enumerate() {
                    rest.try_reserve(name.len() + 1)?;
                    if i > 0 {
                        rest.push('/');
                    }
                    rest.push_str(name);
                }
                return Ok((mount.clone(), rest));
            }
        }
        Err(VfsError::NoSuchMount)
    }

    /// Mounted directly under `/` (excluding `/` itself), sorted by name.
    pub fn top_level_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .mounts
            .keys()
            .filter(|k| k.len() > 1 && !k[1..].contains('/'))
            .map(|k| String::from(&k[1..]))
            .collect();
        names.sort();
        names
    }

    pub fn get(&self, mountpoint: &str) -> Option<&Arc<Mount>> {
        self.mounts.get(mountpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mount>> {
        self.mounts.values()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);
    impl Filesystem for Named {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    fn table() -> MountTable {
        let mut t = MountTable::new();
        t.mount("/", Arc::new(Named("root"))).unwrap();
        t.mount("data", Arc::new(Named("data"))).unwrap();
        t.mount("/data/logs", Arc::new(Named("logs"))).unwrap();
        t
    }

    fn resolve(t: &MountTable, p: &str) -> (&'static str, String) {
        let (m, rest) = t.resolve(&PathList::parse(p).unwrap()).unwrap();
        (m.fs.name(), rest)
    }

    #[test]
    fn test_longest_prefix_wins() {
        let t = table();
        assert_eq!(resolve(&t, "/data/x"), ("data", "x".into()));
        assert_eq!(resolve(&t, "/data/logs/a/b"), ("logs", "a/b".into()));
        assert_eq!(resolve(&t, "/other"), ("root", "other".into()));
        assert_eq!(resolve(&t, "/data"), ("data", String::new()));
        assert_eq!(resolve(&t, "/"), ("root", String::new()));
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        let t = table();
        assert_eq!(resolve(&t, "/database"), ("root", "database".into()));
    }

    #[test]
    fn test_no_root_no_match() {
        let mut t = MountTable::new();
        t.mount("/sd", Arc::new(Named("sd"))).unwrap();
        let r = t.resolve(&PathList::parse("/flash/x").unwrap());
        assert_eq!(r.err(), Some(VfsError::NoSuchMount));
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let mut t = table();
        let err = t.mount("/data/", Arc::new(Named("again"))).err();
        assert_eq!(err, Some(VfsError::AlreadyMounted));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_unmount_busy_while_referenced() {
        let mut t = table();
        let (held, _) = t.resolve(&PathList::parse("/data/f").unwrap()).unwrap();
        assert_eq!(t.unmount("/data").err(), Some(VfsError::Busy));
        drop(held);
        assert!(t.unmount("/data").is_ok());
        assert_eq!(t.unmount("/data").err(), Some(VfsError::NoSuchMount));
        assert_eq!(resolve(&t, "/data/x"), ("root", "data/x".into()));
    }

    #[test]
    fn test_top_level_names() {
        let t = table();
        assert_eq!(t.top_level_names(), ["data"]);
    }

    #[test]
    fn test_canonical_mountpoint() {
        assert_eq!(canonical_mountpoint("").unwrap(), "/");
        assert_eq!(canonical_mountpoint("sd").unwrap(), "/sd");
        assert_eq!(canonical_mountpoint("\\sd\\").unwrap(), "/sd");
    }
}
