//! Path and output helpers shared by the command handlers.
//!
//! - **Output naming**: processed workbooks are written next to their source
//!   as `<stem><suffix>.<ext>`; the source is never overwritten.
//! - **Atomic replace**: bytes go to a temporary sibling that is renamed over
//!   the destination, so readers never observe a half-written file.
//! - **stdout**: the `-` path convention (or no path) routes text to stdout.

use std::{
    ffi::{OsStr, OsString},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{Result, ToolError};

pub const DEFAULT_SUFFIX: &str = "_processed";

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Sibling of `path` with `suffix` inserted before the extension.
///
/// `extension` replaces the source extension when given.
pub fn derive_output_path(path: &Path, suffix: &str, extension: Option<&str>) -> Result<PathBuf> {
    if suffix.is_empty() {
        return Err(ToolError::config(
            "output suffix must not be empty; the source workbook is never overwritten",
        ));
    }
    let stem = path
        .file_stem()
        .ok_or_else(|| ToolError::config(format!("{path:?} has no file name")))?;
    let mut name = OsString::from(stem);
    name.push(suffix);
    if let Some(ext) = extension.map(OsStr::new).or_else(|| path.extension()) {
        name.push(".");
        name.push(ext);
    }
    Ok(path.with_file_name(name))
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
pub fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Writes `text` (plus a trailing newline) to `path`, or stdout for `None`/`-`.
pub fn write_text_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(p) if !is_dash(p) => {
            let mut contents = text.to_string();
            contents.push('\n');
            replace_file(p, contents.as_bytes()).map_err(|err| ToolError::write(p, err))
        }
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{text}")
                .and_then(|_| handle.flush())
                .map_err(|err| ToolError::write(Path::new("-"), err))
        }
    }
}

pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
