use std::fs;

use camino::Utf8Path;

use crate::error::BatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    AlreadyExists,
}

/// Checks whether `path` is free to download into, creating its parent
/// directories when it is. An existing destination is not an error.
///
/// The check is not atomic with the write that follows.
pub fn ensure_writable(path: &Utf8Path) -> Result<Readiness, BatchError> {
    if path.as_std_path().exists() {
        return Ok(Readiness::AlreadyExists);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() && !parent.as_std_path().is_dir() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BatchError::Filesystem(format!("create {parent}: {err}")))?;
        }
    }
    Ok(Readiness::Ready)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn missing_file_creates_parents() {
        let (_temp, root) = temp_root();
        let path = root.join("a/b/c.txt");

        assert_eq!(ensure_writable(&path).unwrap(), Readiness::Ready);
        assert!(root.join("a/b").as_std_path().is_dir());
        assert!(!path.as_std_path().exists());
    }

    #[test]
    fn existing_file_is_reported() {
        let (_temp, root) = temp_root();
        let path = root.join("x.txt");
        fs::write(path.as_std_path(), b"data").unwrap();

        assert_eq!(ensure_writable(&path).unwrap(), Readiness::AlreadyExists);
    }

    #[test]
    fn blocked_parent_is_a_filesystem_error() {
        let (_temp, root) = temp_root();
        fs::write(root.join("blocker").as_std_path(), b"").unwrap();

        let err = ensure_writable(&root.join("blocker/x.txt")).unwrap_err();
        assert!(matches!(err, BatchError::Filesystem(_)));
    }
}
