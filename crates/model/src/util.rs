use std::fs;
use std::io;
use std::path::Path;

/// Writes data atomically through a temporary sibling file followed by rename.
/// 以臨時檔案搭配 rename 實現原子寫入。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_sibling(path);
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Scratch path next to `path`, keeping the original extension visible.
pub fn temp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_parent_directories_and_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b.solxml");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_sibling(&path).exists());
    }
}
