use super::{BackendError, InputFile, ObjectStorage, StoredObject};
use actix_web::web;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Buckets as directories under `root`: each object is `<id>` plus a `<id>.json` sidecar.
pub struct DiskBucket {
    root: PathBuf,
}

impl DiskBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_paths(&self, bucket_id: &str, file_id: &str) -> Result<(PathBuf, PathBuf), BackendError> {
        if !is_safe_id(bucket_id) || !is_safe_id(file_id) {
            return Err(BackendError::NotFound(file_id.to_string()));
        }
        let dir = self.root.join(bucket_id);
        Ok((dir.join(file_id), dir.join(format!("{file_id}.json"))))
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn blocking<T, F>(f: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| BackendError::Storage(e.to_string()))?
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ObjectStorage for DiskBucket {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file: InputFile,
    ) -> Result<StoredObject, BackendError> {
        let (data_path, meta_path) = self.object_paths(bucket_id, file_id)?;
        let object = StoredObject {
            id: file_id.to_string(),
            name: file.name,
            size_original: file.bytes.len() as i64,
            mime_type: infer::get(&file.bytes).map(|t| t.mime_type().to_string()),
        };
        let meta = serde_json::to_vec(&object).map_err(|e| BackendError::Storage(e.to_string()))?;
        let bytes = file.bytes;

        blocking(move || {
            if let Some(dir) = data_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&data_path, &bytes)?;
            if let Err(e) = std::fs::write(&meta_path, &meta) {
                let _ = std::fs::remove_file(&data_path);
                return Err(e.into());
            }
            Ok(())
        })
        .await?;
        Ok(object)
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BackendError> {
        let (data_path, meta_path) = self.object_paths(bucket_id, file_id)?;
        let id = file_id.to_string();
        blocking(move || {
            let existed = remove_if_present(&data_path)?;
            remove_if_present(&meta_path)?;
            if existed { Ok(()) } else { Err(BackendError::NotFound(id)) }
        })
        .await
    }

    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> Result<Option<(StoredObject, Bytes)>, BackendError> {
        let (data_path, meta_path) = match self.object_paths(bucket_id, file_id) {
            Ok(paths) => paths,
            Err(_) => return Ok(None),
        };
        blocking(move || {
            let meta = match std::fs::read(&meta_path) {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let object: StoredObject =
                serde_json::from_slice(&meta).map_err(|e| BackendError::Storage(e.to_string()))?;
            let data = std::fs::read(&data_path)?;
            Ok(Some((object, Bytes::from(data))))
        })
        .await
    }
}
