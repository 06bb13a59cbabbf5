//! TEAM_481: In-memory littlefs stand-in for host builds and tests.
//!
//! Keeps the semantics the backend relies on (parent checks, `EXIST` on
//! exclusive create, `NOTEMPTY` on removing a populated directory, space
//! accounting against the configured region) without modelling blocks.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::LfsError;
use crate::lfs::{FlashConfig, Lfs, LfsInfo, LfsOpenFlags, LfsResult, LfsType, LfsWhence};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

pub struct RamFile {
    path: String,
    pos: u32,
    flags: LfsOpenFlags,
}

pub struct RamDir {
    entries: Vec<LfsInfo>,
    next: usize,
}

#[derive(Default)]
pub struct RamLfs {
    nodes: BTreeMap<String, Node>,
    formatted: bool,
    mounted: bool,
    capacity: u64,
    pub format_count: usize,
    pub mount_count: usize,
}

fn key(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn parent(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(p, _)| p)
}

fn leaf(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, l)| l)
}

impl RamLfs {
    /// Blank flash: the first mount fails as corrupt.
    pub fn new() -> Self {
        Self::default()
    }

    fn used(&self) -> u64 {
        self.nodes
            .values()
            .map(|n| match n {
                Node::File(data) => data.len() as u64,
                Node::Dir => 0,
            })
            .sum()
    }

    fn check_mounted(&self) -> LfsResult<()> {
        if self.mounted { Ok(()) } else { Err(LfsError::Inval) }
    }

    /// Node at `k`, with the root always present.
    fn node(&self, k: &str) -> LfsResult<Node> {
        if k.is_empty() {
            return Ok(Node::Dir);
        }
        self.nodes.get(k).cloned().ok_or(LfsError::NoEnt)
    }

    fn check_parent(&self, k: &str) -> LfsResult<()> {
        match self.node(parent(k))? {
            Node::Dir => Ok(()),
            Node::File(_) => Err(LfsError::NotDir),
        }
    }

    fn info(name: &str, node: &Node) -> LfsInfo {
        match node {
            Node::File(data) => LfsInfo {
                kind: LfsType::Reg,
                size: data.len() as u32,
                name: name.to_string(),
            },
            Node::Dir => LfsInfo {
                kind: LfsType::Dir,
                size: 0,
                name: name.to_string(),
            },
        }
    }

    fn data_mut(&mut self, path: &str) -> LfsResult<&mut Vec<u8>> {
        match self.nodes.get_mut(path) {
            Some(Node::File(data)) => Ok(data),
            Some(Node::Dir) => Err(LfsError::IsDir),
            None => Err(LfsError::BadF),
        }
    }
}

impl Lfs for RamLfs {
    type File = RamFile;
    type Dir = RamDir;

    fn mount(&mut self, cfg: &FlashConfig) -> LfsResult<()> {
        if !self.formatted {
            return Err(LfsError::Corrupt);
        }
        self.capacity = cfg.capacity();
        self.mounted = true;
        self.mount_count += 1;
        Ok(())
    }

    fn format(&mut self, cfg: &FlashConfig) -> LfsResult<()> {
        self.nodes.clear();
        self.capacity = cfg.capacity();
        self.formatted = true;
        self.mounted = false;
        self.format_count += 1;
        Ok(())
    }

    fn unmount(&mut self) -> LfsResult<()> {
        self.check_mounted()?;
        self.mounted = false;
        Ok(())
    }

    fn file_open(&mut self, path: &str, flags: LfsOpenFlags) -> LfsResult<RamFile> {
        self.check_mounted()?;
        let k = key(path);
        if k.is_empty() {
            return Err(LfsError::IsDir);
        }
        self.check_parent(&k)?;
        match self.nodes.get_mut(&k) {
            Some(Node::Dir) => return Err(LfsError::IsDir),
            Some(Node::File(_)) if flags.contains(LfsOpenFlags::CREAT | LfsOpenFlags::EXCL) => {
                return Err(LfsError::Exist);
            }
            Some(Node::File(data)) => {
                if flags.contains(LfsOpenFlags::TRUNC) {
                    data.clear();
                }
            }
            None if flags.contains(LfsOpenFlags::CREAT) => {
                self.nodes.insert(k.clone(), Node::File(Vec::new()));
            }
            None => return Err(LfsError::NoEnt),
        }
        Ok(RamFile {
            path: k,
            pos: 0,
            flags,
        })
    }

    fn file_close(&mut self, _file: RamFile) -> LfsResult<()> {
        Ok(())
    }

    fn file_read(&mut self, file: &mut RamFile, buf: &mut [u8]) -> LfsResult<usize> {
        if !file.flags.readable() {
            return Err(LfsError::BadF);
        }
        let data = self.data_mut(&file.path)?;
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n as u32;
        Ok(n)
    }

    fn file_write(&mut self, file: &mut RamFile, buf: &[u8]) -> LfsResult<usize> {
        if !file.flags.writable() {
            return Err(LfsError::BadF);
        }
        let capacity = self.capacity;
        let used = self.used();
        let data = self.data_mut(&file.path)?;
        if file.flags.contains(LfsOpenFlags::APPEND) {
            file.pos = data.len() as u32;
        }
        let end = file.pos as usize + buf.len();
        let growth = end.saturating_sub(data.len()) as u64;
        if used + growth > capacity {
            return Err(LfsError::NoSpc);
        }
        if end > data.len() {
            data.resize(end, 0);
        }
        data[file.pos as usize..end].copy_from_slice(buf);
        file.pos = end as u32;
        Ok(buf.len())
    }

    fn file_seek(&mut self, file: &mut RamFile, offset: i32, whence: LfsWhence) -> LfsResult<u32> {
        let size = self.data_mut(&file.path)?.len() as i64;
        let base = match whence {
            LfsWhence::Set => 0,
            LfsWhence::Cur => i64::from(file.pos),
            LfsWhence::End => size,
        };
        let pos = base + i64::from(offset);
        file.pos = u32::try_from(pos).map_err(|_| LfsError::Inval)?;
        Ok(file.pos)
    }

    fn file_size(&mut self, file: &mut RamFile) -> LfsResult<u32> {
        Ok(self.data_mut(&file.path)?.len() as u32)
    }

    fn stat(&mut self, path: &str) -> LfsResult<LfsInfo> {
        self.check_mounted()?;
        let k = key(path);
        let node = self.node(&k)?;
        Ok(Self::info(leaf(&k), &node))
    }

    fn rename(&mut self, from: &str, to: &str) -> LfsResult<()> {
        self.check_mounted()?;
        let (from, to) = (key(from), key(to));
        let node = self.nodes.get(&from).cloned().ok_or(LfsError::NoEnt)?;
        self.check_parent(&to)?;
        if matches!(node, Node::Dir) {
            let prefix = alloc::format!("{from}/");
            let moved: Vec<String> = self
                .nodes
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            for old in moved {
                if let Some(child) = self.nodes.remove(&old) {
                    self.nodes.insert(alloc::format!("{to}/{}", &old[prefix.len()..]), child);
                }
            }
        }
        self.nodes.remove(&from);
        self.nodes.insert(to, node);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> LfsResult<()> {
        self.check_mounted()?;
        let k = key(path);
        match self.nodes.get(&k) {
            None => Err(LfsError::NoEnt),
            Some(Node::Dir) if self.nodes.keys().any(|c| parent(c) == k) => {
                Err(LfsError::NotEmpty)
            }
            Some(_) => {
                self.nodes.remove(&k);
                Ok(())
            }
        }
    }

    fn mkdir(&mut self, path: &str) -> LfsResult<()> {
        self.check_mounted()?;
        let k = key(path);
        if k.is_empty() || self.nodes.contains_key(&k) {
            return Err(LfsError::Exist);
        }
        self.check_parent(&k)?;
        self.nodes.insert(k, Node::Dir);
        Ok(())
    }

    fn dir_open(&mut self, path: &str) -> LfsResult<RamDir> {
        self.check_mounted()?;
        let k = key(path);
        if let Node::File(_) = self.node(&k)? {
            return Err(LfsError::NotDir);
        }
        let mut entries = Vec::new();
        entries.push(LfsInfo { kind: LfsType::Dir, size: 0, name: ".".to_string() });
        entries.push(LfsInfo { kind: LfsType::Dir, size: 0, name: "..".to_string() });
        for (child, node) in &self.nodes {
            if !child.is_empty() && parent(child) == k {
                entries.push(Self::info(leaf(child), node));
            }
        }
        Ok(RamDir { entries, next: 0 })
    }

    fn dir_read(&mut self, dir: &mut RamDir) -> LfsResult<Option<LfsInfo>> {
        let entry = dir.entries.get(dir.next).cloned();
        if entry.is_some() {
            dir.next += 1;
        }
        Ok(entry)
    }

    fn dir_close(&mut self, _dir: RamDir) -> LfsResult<()> {
        Ok(())
    }
}
