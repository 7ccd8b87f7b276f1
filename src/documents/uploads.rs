use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::errors::ApiError;

/// Directory holding uploaded scope documents and transient ingestion files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

/// A file that is removed from disk when the guard is dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temporary upload {}: {}", self.path.display(), err);
            }
        }
    }
}

impl UploadStore {
    pub fn new(dir: PathBuf) -> Result<Self, ApiError> {
        std::fs::create_dir_all(&dir).map_err(ApiError::internal)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores a proposal's scope document under a random name that keeps the
    /// original extension.
    pub async fn save_scope_document(&self, original_name: &str, bytes: &[u8]) -> Result<PathBuf, ApiError> {
        let path = self.dir.join(unique_name(original_name));
        tokio::fs::write(&path, bytes).await.map_err(ApiError::internal)?;
        Ok(path)
    }

    pub async fn save_temporary(&self, original_name: &str, bytes: &[u8]) -> Result<TempUpload, ApiError> {
        let path = self.dir.join(format!("tmp-{}", unique_name(original_name)));
        tokio::fs::write(&path, bytes).await.map_err(ApiError::internal)?;
        Ok(TempUpload { path })
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, path: &Path) {
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove upload {}: {}", path.display(), err);
            }
        }
    }
}

fn unique_name(original_name: &str) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Accepts only a bare base name; the name becomes the chunk source key.
pub fn sanitize_file_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("File name is required".to_string()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ApiError::BadRequest(format!("Invalid file name: {}", raw)));
    }
    Ok(name.to_string())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_paths_and_blank_names() {
        assert_eq!(sanitize_file_name(" profile.pdf ").unwrap(), "profile.pdf");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("../etc/passwd").is_err());
        assert!(sanitize_file_name("dir\\file.txt").is_err());
    }

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn scope_documents_keep_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path().join("uploads")).unwrap();

        let path = store.save_scope_document("Scope.DOCX", b"data").await.unwrap();
        assert_eq!(path.extension().unwrap(), "docx");
        assert!(path.starts_with(store.dir()));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");

        store.remove(&path).await;
        assert!(!path.exists());
        store.remove(&path).await;
    }

    #[tokio::test]
    async fn temporary_upload_is_deleted_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path().to_path_buf()).unwrap();

        let guard = store.save_temporary("notes.txt", b"hello").await.unwrap();
        let path = guard.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "txt");

        drop(guard);
        assert!(!path.exists());
    }
}
