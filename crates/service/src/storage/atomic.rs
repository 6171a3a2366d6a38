use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Replace `path` with `contents` so that readers only ever see the old or the
/// new file, never a torn write.
///
/// The bytes go to a sibling temp file (same directory, hence same
/// filesystem), are fsynced, and the temp file is renamed over the target.
/// On any failure before the rename the temp file is dropped, which unlinks it.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let staged = stage(path, contents)?;
    commit(staged, path)
}

/// Write and fsync `contents` into a temp file next to `path`.
pub(crate) fn stage(path: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let dir = parent_dir(path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Rename a staged temp file over `path`.
pub(crate) fn commit(staged: NamedTempFile, path: &Path) -> io::Result<()> {
    // PersistError hands the temp file back; dropping it removes it from disk
    staged.persist(path).map_err(|e| e.error)?;
    sync_dir(&parent_dir(path));
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = std::fs::File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    #[test]
    fn replaces_existing_content_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state.json");
        std::fs::write(&target, b"old").unwrap();

        atomic_write(&target, b"new content").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new content");
        assert!(temp_entries(dir.path()).is_empty());
    }

    #[test]
    fn staged_but_uncommitted_write_keeps_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state.json");
        std::fs::write(&target, b"old").unwrap();

        let staged = stage(&target, b"half").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        drop(staged);

        assert!(temp_entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_rename_cleans_up_temp() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("inner"), b"x").unwrap();

        assert!(atomic_write(&target, b"data").is_err());
        assert!(temp_entries(dir.path()).is_empty());
    }
}
