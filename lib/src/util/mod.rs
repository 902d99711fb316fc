mod macros;

pub use macros::*;

use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Chainable, Result};

/// File extensions recognized as markdown sources, compared case-insensitively.
pub const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// The file name of `path` without its final extension.
pub fn basename(path: &Path) -> Cow<'_, str> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or(Cow::Borrowed(""))
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.iter().any(|md| ext.eq_ignore_ascii_case(md)))
}

/// Returns `true` if `parent` names the same directory as `dir`, following
/// symlinks when both exist.
pub fn same_dir(parent: Option<&Path>, dir: &Path) -> bool {
    let Some(parent) = parent else {
        return false;
    };

    let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
    match (parent.canonicalize(), dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => parent == dir,
    }
}

/// A hidden path next to `root` tagged with `tag`: `out/site` becomes
/// `out/.site.tag`.
pub fn sibling(root: &Path, tag: &str) -> PathBuf {
    let name = root.file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or(Cow::Borrowed("output"));

    root.with_file_name(format!(".{name}.{tag}"))
}

/// Removes the file or directory tree at `path`. A missing path is not an
/// error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };

    result.chain_with(|| error!("failed to remove path", "path" => path.display()))
}

/// Removes everything at `path` and recreates it as an empty directory.
pub fn purge_dir(path: &Path) -> Result<()> {
    remove_if_exists(path)?;
    fs::create_dir_all(path).chain_with(|| error! {
        "failed to create directory",
        "path" => path.display(),
    })
}

/// Recursively copies the contents of `src` into `dst`, returning the number
/// of files copied. Hidden files are copied too.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return err!(kind = Io, "not a directory", "path" => src.display());
    }

    let walker = jwalk::WalkDir::new(src)
        .follow_links(true)
        .skip_hidden(false)
        .sort(true);

    let mut copied = 0;
    for entry in walker {
        let entry = entry.chain_with(|| error!("failed to walk directory", "path" => src.display()))?;
        if entry.depth == 0 {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };

        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).chain_with(|| error! {
                "failed to create directory",
                "path" => target.display(),
            })?;
        } else {
            fs::copy(&path, &target).chain_with(|| error! {
                "failed to copy file",
                "from" => path.display(),
                "to" => target.display(),
            })?;

            copied += 1;
        }
    }

    Ok(copied)
}

/// Writes `bytes` to `path` through a temporary file in the same directory so
/// readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let write = || -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_data()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    };

    write().chain_with(|| error!("failed to write file", "path" => path.display()))
}
