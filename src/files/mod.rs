pub mod kind;
pub mod listing;
pub mod query;
pub mod upload;

use crate::backend::{BackendError, CollectionRef, DocumentStore, IdentityProvider, ObjectStorage};
use crate::cache::Revalidate;
use crate::config::Config;
use std::sync::Arc;
use thiserror::Error;

pub use upload::UploadFile;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("User not found")]
    UserNotFound,
    #[error("failed to upload file: {0}")]
    Upload(#[source] BackendError),
    #[error("failed to create file document: {0}")]
    CreateDocument(#[source] BackendError),
    #[error("failed to get files: {0}")]
    List(#[source] BackendError),
}

/// Logs a failure for operators and hands it back for propagation.
fn handle_error(err: FileError) -> FileError {
    log::error!("{err}");
    err
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub bucket_id: String,
    pub collection: CollectionRef,
    pub public_base_url: String,
}

impl From<&Config> for StorageSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            bucket_id: cfg.bucket_id.clone(),
            collection: CollectionRef {
                database_id: cfg.database_id.clone(),
                collection_id: cfg.files_collection_id.clone(),
            },
            public_base_url: cfg.public_base_url.clone(),
        }
    }
}

/// Upload and listing over the identity, bucket and document collaborators.
pub struct FileService {
    identity: Arc<dyn IdentityProvider>,
    bucket: Arc<dyn ObjectStorage>,
    documents: Arc<dyn DocumentStore>,
    views: Arc<dyn Revalidate>,
    settings: StorageSettings,
}

impl FileService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        bucket: Arc<dyn ObjectStorage>,
        documents: Arc<dyn DocumentStore>,
        views: Arc<dyn Revalidate>,
        settings: StorageSettings,
    ) -> Self {
        Self { identity, bucket, documents, views, settings }
    }

    pub fn bucket(&self) -> &dyn ObjectStorage {
        self.bucket.as_ref()
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }
}
