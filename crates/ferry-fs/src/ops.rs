//! Managed directory operations using tokio::fs

use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::debug;

/// The single server-side directory every command operates on
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Callers validate `name` first; it is always a bare filename
    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn exists(&self, name: &str) -> bool {
        fs::symlink_metadata(self.path(name)).await.is_ok()
    }

    pub async fn is_dir(&self, name: &str) -> bool {
        fs::metadata(self.path(name)).await.is_ok_and(|m| m.is_dir())
    }

    /// Non-directory entries, sorted by name.
    ///
    /// Entries that vanish mid-enumeration are skipped. Names that cannot be
    /// carried on a control line (not UTF-8, or holding a line terminator)
    /// are left out.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let is_dir = match entry.file_type().await {
                Ok(ft) if ft.is_symlink() => self.is_dir_path(&entry.path()).await,
                Ok(ft) => ft.is_dir(),
                Err(_) => continue,
            };
            if is_dir {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.contains(['\n', '\r']) => names.push(name),
                Ok(name) => debug!(?name, "skipping unlistable name"),
                Err(name) => debug!(?name, "skipping non UTF-8 name"),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn is_dir_path(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok_and(|m| m.is_dir())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            res => Ok(res?),
        }
    }

    /// Rename without overwriting. The existence checks and the rename are
    /// not atomic; sessions are served one at a time.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        if !self.exists(old).await {
            return Err(Error::NotFound(old.to_string()));
        }
        if self.exists(new).await {
            return Err(Error::AlreadyExists(new.to_string()));
        }
        fs::rename(self.path(old), self.path(new)).await?;
        Ok(())
    }

    /// Open a regular file for sending, with its current length
    pub async fn open_read(&self, name: &str) -> Result<(File, u64)> {
        let path = self.path(name);
        let meta = match fs::metadata(&path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound(name.to_string())),
            res => res?,
        };
        if meta.is_dir() {
            return Err(Error::IsDirectory(name.to_string()));
        }

        let file = File::open(&path).await?;
        Ok((file, meta.len()))
    }

    /// Create or truncate `name` for receiving
    pub async fn create_write(&self, name: &str) -> Result<File> {
        if self.is_dir(name).await {
            return Err(Error::IsDirectory(name.to_string()));
        }
        Ok(File::create(self.path(name)).await?)
    }

    /// Best-effort removal of a partially received file
    pub async fn discard_partial(&self, name: &str) {
        if let Err(e) = fs::remove_file(self.path(name)).await {
            debug!(name, error = %e, "could not remove partial file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, data) in files {
            std::fs::write(dir.path().join(name), data).unwrap();
        }
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn list_is_sorted_and_skips_directories() {
        let (dir, store) = store_with(&[("b.txt", "b"), ("a.txt", "a")]);
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn empty_directory_lists_nothing() {
        let (_dir, store) = store_with(&[]);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_dir, store) = store_with(&[("a.txt", "hello")]);

        assert!(matches!(store.delete("nope.txt").await, Err(Error::NotFound(_))));
        assert_eq!(store.list().await.unwrap(), vec!["a.txt"]);

        store.delete("a.txt").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_refuses_to_overwrite() {
        let (dir, store) = store_with(&[("old.txt", "old"), ("new.txt", "new")]);

        assert!(matches!(store.rename("old.txt", "new.txt").await, Err(Error::AlreadyExists(_))));
        assert_eq!(std::fs::read(dir.path().join("old.txt")).unwrap(), b"old");
        assert_eq!(std::fs::read(dir.path().join("new.txt")).unwrap(), b"new");

        assert!(matches!(store.rename("gone.txt", "x.txt").await, Err(Error::NotFound(_))));

        store.rename("old.txt", "moved.txt").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["moved.txt", "new.txt"]);
    }

    #[tokio::test]
    async fn open_read_checks_kind() {
        let (dir, store) = store_with(&[("a.txt", "hello")]);
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let (_file, len) = store.open_read("a.txt").await.unwrap();
        assert_eq!(len, 5);
        assert!(matches!(store.open_read("sub").await, Err(Error::IsDirectory(_))));
        assert!(matches!(store.open_read("missing").await, Err(Error::NotFound(_))));
    }
}
