//! Local save targets for finished downloads.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where finished archives and single files are handed off.
#[async_trait]
pub trait SaveSink: Send + Sync {
    /// Stores `bytes` under `name` and returns the resulting location.
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<PathBuf>;
}

/// Saves into a directory using `.part` files and an atomic rename.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    force_overwrite: bool,
}

impl DirectorySink {
    /// Creates a sink writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            force_overwrite: false,
        }
    }

    /// Sets whether existing files are replaced.
    #[must_use]
    pub const fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target_path(&self, name: &str) -> Result<PathBuf> {
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|file_name| file_name == name);
        if !plain {
            return Err(Error::InvalidFilename(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

#[async_trait]
impl SaveSink for DirectorySink {
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<PathBuf> {
        let path = self.target_path(name)?;

        if !self.force_overwrite && tokio::fs::metadata(&path).await.is_ok() {
            return Err(Error::FileExists {
                path: path.display().to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let pp = part_path(&path);
        let written = async {
            tokio::fs::write(&pp, &bytes).await?;
            tokio::fs::rename(&pp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&pp).await;
            return Err(e.into());
        }

        log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("out/photos_all.zip")),
            PathBuf::from("out/photos_all.zip.part")
        );
    }

    #[tokio::test]
    async fn saves_into_directory() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());

        let path = sink.save("gallery_all.zip", b"PK".to_vec()).await.unwrap();

        assert_eq!(path, dir.path().join("gallery_all.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        let sink = DirectorySink::new(&nested);

        sink.save("one.jpg", vec![1, 2, 3]).await.unwrap();
        assert!(nested.join("one.jpg").exists());
    }

    #[tokio::test]
    async fn refuses_to_overwrite_by_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one.jpg"), b"old").unwrap();
        let sink = DirectorySink::new(dir.path());

        let err = sink.save("one.jpg", b"new".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::FileExists { .. }));
        assert_eq!(std::fs::read(dir.path().join("one.jpg")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn overwrites_when_forced() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one.jpg"), b"old").unwrap();
        let sink = DirectorySink::new(dir.path()).with_force_overwrite(true);

        sink.save("one.jpg", b"new".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("one.jpg")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());

        for name in ["../escape.jpg", "sub/dir.jpg", "", ".."] {
            let err = sink.save(name, vec![]).await.unwrap_err();
            assert!(matches!(err, Error::InvalidFilename(_)), "{name}");
        }
    }
}
