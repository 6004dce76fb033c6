//! Collaborators the storage front end is written against.
//!
//! Identity, object storage and the document store are separate systems with
//! no shared transaction. Anything that spans two of them (see
//! [`crate::files::FileService::upload_file`]) can only compensate after the
//! fact.

pub mod disk;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

use crate::auth::AuthUser;
use crate::files::query::Query;
use crate::models::{AccountRef, FileDocument, FileRecord, User};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrong guesses a pending email secret survives before it is discarded.
pub const MAX_SECRET_ATTEMPTS: i64 = 5;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

/// File contents as received from the client.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Bytes,
}

impl InputFile {
    pub fn from_buffer(bytes: impl Into<Bytes>, name: impl Into<String>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}

/// A binary as the bucket recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub id: String,
    pub name: String,
    pub size_original: i64,
    pub mime_type: Option<String>,
}

/// Addresses one collection inside one database of the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub database_id: String,
    pub collection_id: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers `email` if unknown and sends it a fresh secret.
    async fn create_account(&self, full_name: &str, email: &str) -> Result<AccountRef, BackendError>;

    /// Sends a fresh secret to an existing account.
    async fn sign_in_user(&self, email: &str) -> Result<AccountRef, BackendError>;

    /// Consumes the account's live secret when it matches. After
    /// [`MAX_SECRET_ATTEMPTS`] mismatches the secret is discarded.
    async fn verify_secret(&self, account_id: &str, secret: &str) -> Result<User, BackendError>;

    async fn get_current_user(&self, session: Option<&AuthUser>) -> Result<Option<User>, BackendError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file: InputFile,
    ) -> Result<StoredObject, BackendError>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BackendError>;

    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> Result<Option<(StoredObject, Bytes)>, BackendError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        collection: &CollectionRef,
        document_id: &str,
        document: FileDocument,
    ) -> Result<FileRecord, BackendError>;

    /// Every query must hold for a record to be returned.
    async fn list_documents(
        &self,
        collection: &CollectionRef,
        queries: &[Query],
    ) -> Result<Vec<FileRecord>, BackendError>;
}

/// Gets a one-time secret to the owner of an email address.
#[async_trait]
pub trait SecretDelivery: Send + Sync {
    async fn deliver(&self, email: &str, secret: &str) -> Result<(), BackendError>;
}

/// Writes secrets to the log instead of sending mail. Development only.
pub struct LogDelivery;

#[async_trait]
impl SecretDelivery for LogDelivery {
    async fn deliver(&self, email: &str, secret: &str) -> Result<(), BackendError> {
        log::info!("email secret for {email}: {secret}");
        Ok(())
    }
}
