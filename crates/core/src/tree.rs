//! Recursive equality check between two directory trees
//!
//! Two trees match when they hold the same names, with the same entry kinds,
//! and every file has identical bytes and an identical modification time.
//! Entries are sorted by name before pairing so the result does not depend on
//! the directory listing order of the underlying filesystem.
//!
//! Special files (FIFOs, sockets, device nodes) are never opened. They are left
//! out of both listings, matching the copier which does not back them up.

use std::cmp::Ordering;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHUNK_SIZE: usize = 64 * 1024;

/// Failure to list or read one side of the comparison
#[derive(Debug, Error)]
#[error("failed to read {}: {source}", path.display())]
pub struct CompareError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Kind of a directory entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

/// Why two trees differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// Directories hold a different number of entries
    EntryCount { left: usize, right: usize },
    /// Entries at the same sorted position have different names
    Name { left: String, right: String },
    /// Same name, different kind
    Kind { left: EntryKind, right: EntryKind },
    /// File sizes differ
    Size { left: u64, right: u64 },
    /// File bytes differ
    Content,
    /// File modification times differ
    ModifiedTime,
    /// Symlinks point at different targets
    LinkTarget,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
            EntryKind::Symlink => "symlink",
        })
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::EntryCount { left, right } => {
                write!(f, "{left} entries versus {right}")
            }
            MismatchReason::Name { left, right } => write!(f, "{left:?} versus {right:?}"),
            MismatchReason::Kind { left, right } => write!(f, "{left} versus {right}"),
            MismatchReason::Size { left, right } => write!(f, "{left} bytes versus {right}"),
            MismatchReason::Content => f.write_str("contents differ"),
            MismatchReason::ModifiedTime => f.write_str("modification times differ"),
            MismatchReason::LinkTarget => f.write_str("link targets differ"),
        }
    }
}

/// Result of comparing two trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeComparison {
    Match,
    /// First difference found, `path` relative to the compared roots
    Mismatch { path: PathBuf, reason: MismatchReason },
}

impl TreeComparison {
    pub fn is_match(&self) -> bool {
        matches!(self, TreeComparison::Match)
    }
}

/// Compare two directory trees, stopping at the first difference
pub fn compare_trees(left: &Path, right: &Path) -> Result<TreeComparison, CompareError> {
    compare_dirs(left, right, Path::new(""))
}

/// Boolean form of [`compare_trees`]
pub fn trees_match(left: &Path, right: &Path) -> Result<bool, CompareError> {
    Ok(compare_trees(left, right)?.is_match())
}

struct Listed {
    name: OsString,
    path: PathBuf,
    kind: EntryKind,
}

fn compare_dirs(left: &Path, right: &Path, rel: &Path) -> Result<TreeComparison, CompareError> {
    let left_entries = list_sorted(left)?;
    let right_entries = list_sorted(right)?;

    if left_entries.len() != right_entries.len() {
        return Ok(mismatch(
            rel,
            MismatchReason::EntryCount {
                left: left_entries.len(),
                right: right_entries.len(),
            },
        ));
    }

    for (l, r) in left_entries.iter().zip(right_entries.iter()) {
        if l.name != r.name {
            return Ok(mismatch(
                rel,
                MismatchReason::Name {
                    left: l.name.to_string_lossy().into_owned(),
                    right: r.name.to_string_lossy().into_owned(),
                },
            ));
        }

        let entry_rel = rel.join(&l.name);
        if l.kind != r.kind {
            return Ok(mismatch(
                &entry_rel,
                MismatchReason::Kind {
                    left: l.kind,
                    right: r.kind,
                },
            ));
        }

        let outcome = match l.kind {
            EntryKind::Directory => compare_dirs(&l.path, &r.path, &entry_rel)?,
            EntryKind::File => compare_files(&l.path, &r.path, &entry_rel)?,
            EntryKind::Symlink => compare_links(&l.path, &r.path, &entry_rel)?,
        };
        if !outcome.is_match() {
            return Ok(outcome);
        }
    }

    Ok(TreeComparison::Match)
}

fn list_sorted(dir: &Path) -> Result<Vec<Listed>, CompareError> {
    let io_err = |source| CompareError {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(|source| CompareError {
            path: entry.path(),
            source,
        })?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            continue;
        };

        entries.push(Listed {
            name: entry.file_name(),
            path: entry.path(),
            kind,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn compare_files(left: &Path, right: &Path, rel: &Path) -> Result<TreeComparison, CompareError> {
    let left_meta = metadata(left)?;
    let right_meta = metadata(right)?;

    if left_meta.len() != right_meta.len() {
        return Ok(mismatch(
            rel,
            MismatchReason::Size {
                left: left_meta.len(),
                right: right_meta.len(),
            },
        ));
    }

    if !same_bytes(left, right)? {
        return Ok(mismatch(rel, MismatchReason::Content));
    }

    let left_mtime = left_meta.modified().map_err(|source| CompareError {
        path: left.to_path_buf(),
        source,
    })?;
    let right_mtime = right_meta.modified().map_err(|source| CompareError {
        path: right.to_path_buf(),
        source,
    })?;
    if left_mtime != right_mtime {
        return Ok(mismatch(rel, MismatchReason::ModifiedTime));
    }

    Ok(TreeComparison::Match)
}

fn compare_links(left: &Path, right: &Path, rel: &Path) -> Result<TreeComparison, CompareError> {
    let read = |path: &Path| {
        fs::read_link(path).map_err(|source| CompareError {
            path: path.to_path_buf(),
            source,
        })
    };

    if read(left)? != read(right)? {
        return Ok(mismatch(rel, MismatchReason::LinkTarget));
    }
    Ok(TreeComparison::Match)
}

fn metadata(path: &Path) -> Result<fs::Metadata, CompareError> {
    fs::metadata(path).map_err(|source| CompareError {
        path: path.to_path_buf(),
        source,
    })
}

/// Streaming byte comparison of two files of equal length
fn same_bytes(left: &Path, right: &Path) -> Result<bool, CompareError> {
    let open = |path: &Path| {
        File::open(path)
            .map(|f| BufReader::with_capacity(CHUNK_SIZE, f))
            .map_err(|source| CompareError {
                path: path.to_path_buf(),
                source,
            })
    };
    let mut left_reader = open(left)?;
    let mut right_reader = open(right)?;

    let mut left_buf = vec![0u8; CHUNK_SIZE];
    let mut right_buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_full(&mut left_reader, &mut left_buf).map_err(|source| CompareError {
            path: left.to_path_buf(),
            source,
        })?;
        let m = read_full(&mut right_reader, &mut right_buf).map_err(|source| CompareError {
            path: right.to_path_buf(),
            source,
        })?;

        match n.cmp(&m) {
            Ordering::Equal if n == 0 => return Ok(true),
            Ordering::Equal => {
                if left_buf[..n] != right_buf[..m] {
                    return Ok(false);
                }
            }
            // File grew or shrank while reading
            _ => return Ok(false),
        }
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (0 at EOF)
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn mismatch(path: &Path, reason: MismatchReason) -> TreeComparison {
    TreeComparison::Mismatch {
        path: path.to_path_buf(),
        reason,
    }
}
