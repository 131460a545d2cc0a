//! Recursive tree copy used to materialize snapshots

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Copies a whole directory tree to a new location
pub trait TreeCopier: Send + Sync {
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Plain file system copy preserving modification and access times
///
/// Symbolic links are recreated, not followed. Special files (FIFOs, sockets,
/// device nodes) are skipped; reading a FIFO would block on its writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCopier;

impl FsCopier {
    pub fn new() -> Self {
        Self
    }
}

impl TreeCopier for FsCopier {
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        // Directory times are restored last; populating a directory bumps its mtime
        let mut dirs: Vec<(PathBuf, PathBuf)> = Vec::new();

        for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let target = to.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
                dirs.push((entry.path().to_path_buf(), target));
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), &target)?;
            } else if file_type.is_file() {
                fs::copy(entry.path(), &target)?;
                let meta = entry.metadata().map_err(io::Error::from)?;
                preserve_times(&meta, &target)?;
            } else {
                debug!("Skipping special file {}", entry.path().display());
            }
        }

        for (source, target) in dirs.iter().rev() {
            preserve_times(&fs::metadata(source)?, target)?;
        }

        Ok(())
    }
}

fn preserve_times(meta: &fs::Metadata, target: &Path) -> io::Result<()> {
    filetime::set_file_times(
        target,
        FileTime::from_last_access_time(meta),
        FileTime::from_last_modification_time(meta),
    )
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}
