//! TEAM_466: Path name algebra
//!
//! A path is parsed once into an owned list of [`Segment`]s. Both `/` and `\`
//! separate segments, empty and `.` segments are dropped, and `..` is only
//! interpreted when one list is joined onto another. Rendering always yields
//! an absolute-looking string, with the empty list rendering as `/`.
//!
//! All allocation goes through `try_reserve` so a full heap surfaces as
//! [`VfsError::OutOfMemory`] instead of an abort.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::VfsResult;

/// One normalized path segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Synthetic root marker. Only ever the first segment of a list.
    Root,
    Name(String),
}

impl Segment {
    pub fn is_parent(&self) -> bool {
        matches!(self, Segment::Name(n) if n == "..")
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Segment::Root => None,
            Segment::Name(n) => Some(n),
        }
    }
}

#[inline]
fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn try_owned(s: &str) -> VfsResult<String> {
    let mut out = String::new();
    out.try_reserve(s.len())?;
    out.push_str(s);
    Ok(out)
}

/// Ordered segment list plus the text it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathList {
    source: String,
    segments: Vec<Segment>,
}

impl PathList {
    /// Split `s` into segments.
    pub fn parse(s: &str) -> VfsResult<Self> {
        let mut segments = Vec::new();
        if s.starts_with(is_separator) {
            segments.try_reserve(1)?;
            segments.push(Segment::Root);
        }
        for part in s.split(is_separator) {
            if part.is_empty() || part == "." {
                continue;
            }
            segments.try_reserve(1)?;
            segments.push(Segment::Name(try_owned(part)?));
        }
        Ok(Self {
            source: try_owned(s)?,
            segments,
        })
    }

    /// The list holding only the root marker.
    pub fn root() -> Self {
        Self {
            source: String::from("/"),
            segments: alloc::vec![Segment::Root],
        }
    }

    /// Consume `addition` into `self`, left to right.
    ///
    /// `..` removes the last name of `self` (the root marker is never
    /// removed and surplus `..` is dropped), a root marker clears `self`
    /// first, and any other segment is appended.
    pub fn join(&mut self, addition: PathList) -> VfsResult<()> {
        for seg in addition.segments {
            match seg {
                Segment::Root => {
                    self.segments.clear();
                    self.segments.try_reserve(1)?;
                    self.segments.push(Segment::Root);
                }
                s if s.is_parent() => {
                    if matches!(self.segments.last(), Some(Segment::Name(_))) {
                        self.segments.pop();
                    }
                }
                s => {
                    self.segments.try_reserve(1)?;
                    self.segments.push(s);
                }
            }
        }
        Ok(())
    }

    /// Canonical text form: `/` before every name, `/` alone when empty.
    pub fn render(&self) -> VfsResult<String> {
        let len = self.names().map(|n| n.len() + 1).sum::<usize>().max(1);
        let mut out = String::new();
        out.try_reserve(len)?;
        for name in self.names() {
            out.push('/');
            out.push_str(name);
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Non-root segments in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::as_name)
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self.segments.first(), Some(Segment::Root))
    }

    /// True when the list names the root itself.
    pub fn is_root(&self) -> bool {
        self.names().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Text this list was originally parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for PathList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut any = false;
        for name in self.names() {
            write!(f, "/{name}")?;
            any = true;
        }
        if !any {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// Join `path` onto `base` and render the result.
pub fn append(base: &str, path: &str) -> VfsResult<String> {
    let mut list = PathList::parse(base)?;
    list.join(PathList::parse(path)?)?;
    list.render()
}

// ============================================================================
// Unit Tests
// ============================================================================
