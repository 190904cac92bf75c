use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::error::{ModeError, ModeResult};

/// Returns `false` if `file` is already absolute or explicitly relative and
/// must not have a directory prepended.
pub fn need_dir(file: &str) -> bool {
    if file.starts_with('/') || file.starts_with("./") {
        return false;
    }
    #[cfg(windows)]
    {
        let bytes = file.as_bytes();
        if (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
            || file.starts_with('\\')
            || file.starts_with(".\\")
        {
            return false;
        }
    }
    true
}

/// Joins `dir` and `file` unless `file` stands on its own.
pub fn add_possible_dir(dir: &str, file: &str) -> String {
    if need_dir(file) {
        let mut path = String::with_capacity(dir.len() + file.len() + 1);
        path.push_str(dir);
        if !dir.ends_with('/') {
            path.push('/');
        }
        path.push_str(file);
        path
    } else {
        file.to_string()
    }
}

pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// A file located by [`find_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub path: PathBuf,
    /// Length of the directory prefix of `path`, including the separator.
    pub dir_len: usize,
}

/// Looks for `file_name` in each directory of `dirs`, in order, and returns
/// the first existing path.
pub fn find_file<S: AsRef<str>>(dirs: &[S], file_name: &str) -> Option<FoundFile> {
    dirs.iter().find_map(|dir| {
        let mut path = dir.as_ref().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        let dir_len = path.len();
        path.push_str(file_name);
        file_exists(&path).then(|| FoundFile {
            path: PathBuf::from(path),
            dir_len,
        })
    })
}

/// Splits a search-path string into its directories.
pub fn split_search_path(search_path: &str) -> Vec<PathBuf> {
    if search_path.is_empty() {
        return Vec::new();
    }
    std::env::split_paths(search_path).collect()
}

/// Joins directories into a single search-path string.
pub fn join_search_path<S: AsRef<OsStr>>(dirs: &[S]) -> ModeResult<String> {
    let joined = std::env::join_paths(dirs.iter())
        .map_err(|e| ModeError::InvalidSearchPath(e.to_string()))?;
    joined
        .into_string()
        .map_err(|raw| ModeError::InvalidSearchPath(raw.to_string_lossy().into_owned()))
}

/// Lazily walks the files ending in a suffix across an ordered list of
/// directories.
///
/// Directories are visited in the order given and each one is read only when
/// the previous one is exhausted. Files within a directory come out sorted by
/// name. Missing or unreadable directories are skipped. The open directory
/// handle belongs to the iterator and is released when it moves on or is
/// dropped.
pub struct PathBrowser {
    dirs: std::vec::IntoIter<PathBuf>,
    suffix: String,
    current: Option<walkdir::IntoIter>,
}

impl PathBrowser {
    pub fn new(dirs: Vec<PathBuf>, suffix: &str) -> Self {
        Self {
            dirs: dirs.into_iter(),
            suffix: suffix.to_string(),
            current: None,
        }
    }

    fn has_suffix(&self, name: &OsStr) -> bool {
        let Some(name) = name.to_str() else {
            return false;
        };
        self.suffix.is_empty() || (name.len() > self.suffix.len() && name.ends_with(&self.suffix))
    }
}

impl Iterator for PathBrowser {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let Some(walker) = self.current.as_mut() else {
                let dir = self.dirs.next()?;
                self.current = Some(
                    WalkDir::new(dir)
                        .min_depth(1)
                        .max_depth(1)
                        .follow_links(true)
                        .sort_by_file_name()
                        .into_iter(),
                );
                continue;
            };

            match walker.next() {
                Some(Ok(entry)) => {
                    if entry.file_type().is_file() && self.has_suffix(entry.file_name()) {
                        return Some(entry.into_path());
                    }
                }
                Some(Err(e)) => {
                    if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) {
                        debug!("skipping missing search path entry: {e}");
                    } else {
                        warn!("skipping unreadable search path entry: {e}");
                    }
                }
                None => self.current = None,
            }
        }
    }
}
