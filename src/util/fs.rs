//! Filesystem utilities.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, returning `None` if it does not exist.
pub fn read_to_string_opt(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read file: {}", path.display())),
    }
}

/// Replace a file's contents atomically (write to a sibling temp file, then rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path has no parent directory: {}", path.display()))?;
    ensure_dir(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Whether any line of the file equals `line` after trimming whitespace.
pub fn contains_line(path: &Path, line: &str) -> Result<bool> {
    let wanted = line.trim();
    Ok(read_to_string_opt(path)?
        .map(|contents| contents.lines().any(|l| l.trim() == wanted))
        .unwrap_or(false))
}

/// Append `line` to the file, creating it (and its parents) if needed.
///
/// A newline is inserted first when the existing file does not end with one.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let needs_newline = read_to_string_opt(path)?
        .map(|c| !c.is_empty() && !c.ends_with('\n'))
        .unwrap_or(false);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open for append: {}", path.display()))?;

    if needs_newline {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{}", line.trim())
        .with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}

/// Remove every line equal to `line` (after trimming) from the file.
///
/// The file is deleted when nothing but blank lines remain. Returns whether
/// anything was removed.
pub fn remove_line(path: &Path, line: &str) -> Result<bool> {
    let wanted = line.trim();
    let Some(contents) = read_to_string_opt(path)? else {
        return Ok(false);
    };

    let kept: Vec<&str> = contents.lines().filter(|l| l.trim() != wanted).collect();
    if kept.len() == contents.lines().count() {
        return Ok(false);
    }

    if kept.iter().all(|l| l.trim().is_empty()) {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    } else {
        let mut rest = kept.join("\n");
        rest.push('\n');
        write_atomic(path, rest.as_bytes())?;
    }
    Ok(true)
}
