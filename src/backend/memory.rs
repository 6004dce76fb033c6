//! In-process collaborators for tests. Each `fail_*` call arms a single
//! failure for the next matching operation.

use super::{
    BackendError, CollectionRef, DocumentStore, IdentityProvider, InputFile, ObjectStorage,
    StoredObject, MAX_SECRET_ATTEMPTS,
};
use crate::auth::AuthUser;
use crate::files::query::Query;
use crate::models::{AccountRef, FileDocument, FileRecord, User};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

fn arm(slot: &Mutex<Option<BackendError>>, err: BackendError) {
    *slot.lock().unwrap() = Some(err);
}

fn fire(slot: &Mutex<Option<BackendError>>) -> Result<(), BackendError> {
    match slot.lock().unwrap().take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct MemoryIdentity {
    users: Mutex<Vec<User>>,
    /// Pending secret and failed attempts per account.
    secrets: Mutex<HashMap<String, (String, i64)>>,
    fail_next: Mutex<Option<BackendError>>,
    calls: AtomicUsize,
}

impl MemoryIdentity {
    pub fn insert_user(&self, full_name: &str, email: &str) -> User {
        let id = uuid::Uuid::new_v4().to_string();
        let user = User {
            account_id: format!("acct-{id}"),
            id,
            email: email.into(),
            full_name: full_name.into(),
            created_at: chrono::Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn fail_next(&self, err: BackendError) {
        arm(&self.fail_next, err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn secret_for(&self, account_id: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(account_id).map(|(s, _)| s.clone())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.email == email).cloned()
    }

    fn issue_secret(&self, account_id: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert(account_id.to_string(), (crate::auth::generate_email_secret(), 0));
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn create_account(&self, full_name: &str, email: &str) -> Result<AccountRef, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fire(&self.fail_next)?;
        let user = match self.find_by_email(email) {
            Some(u) => u,
            None => self.insert_user(full_name, email),
        };
        self.issue_secret(&user.account_id);
        Ok(AccountRef { account_id: user.account_id })
    }

    async fn sign_in_user(&self, email: &str) -> Result<AccountRef, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fire(&self.fail_next)?;
        let user = self
            .find_by_email(email)
            .ok_or_else(|| BackendError::NotFound("user".into()))?;
        self.issue_secret(&user.account_id);
        Ok(AccountRef { account_id: user.account_id })
    }

    async fn verify_secret(&self, account_id: &str, secret: &str) -> Result<User, BackendError> {
        let mut secrets = self.secrets.lock().unwrap();
        let Some((expected, attempts)) = secrets.get_mut(account_id) else {
            return Err(BackendError::Rejected("no pending secret".into()));
        };
        if expected.as_str() != secret {
            *attempts += 1;
            if *attempts >= MAX_SECRET_ATTEMPTS {
                secrets.remove(account_id);
            }
            return Err(BackendError::Rejected("invalid secret".into()));
        }
        secrets.remove(account_id);
        drop(secrets);
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.account_id == account_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound("user".into()))
    }

    async fn get_current_user(&self, session: Option<&AuthUser>) -> Result<Option<User>, BackendError> {
        let Some(session) = session else {
            return Ok(None);
        };
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.account_id == session.account_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryBucket {
    objects: Mutex<HashMap<(String, String), (StoredObject, Bytes)>>,
    fail_create: Mutex<Option<BackendError>>,
    fail_delete: Mutex<Option<BackendError>>,
    deletes: AtomicUsize,
}

impl MemoryBucket {
    pub fn fail_creates(&self, err: BackendError) {
        arm(&self.fail_create, err);
    }

    pub fn fail_deletes(&self, err: BackendError) {
        arm(&self.fail_delete, err);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.objects.lock().unwrap().keys().any(|(_, id)| id == file_id)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for MemoryBucket {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file: InputFile,
    ) -> Result<StoredObject, BackendError> {
        fire(&self.fail_create)?;
        let object = StoredObject {
            id: file_id.to_string(),
            name: file.name,
            size_original: file.bytes.len() as i64,
            mime_type: infer::get(&file.bytes).map(|t| t.mime_type().to_string()),
        };
        self.objects
            .lock()
            .unwrap()
            .insert((bucket_id.to_string(), file_id.to_string()), (object.clone(), file.bytes));
        Ok(object)
    }

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<(), BackendError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        fire(&self.fail_delete)?;
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket_id.to_string(), file_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(file_id.to_string()))
    }

    async fn get_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> Result<Option<(StoredObject, Bytes)>, BackendError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket_id.to_string(), file_id.to_string()))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryDocuments {
    records: Mutex<Vec<(CollectionRef, FileRecord)>>,
    fail_create: Mutex<Option<BackendError>>,
    fail_list: Mutex<Option<BackendError>>,
    creates: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryDocuments {
    pub fn fail_creates(&self, err: BackendError) {
        arm(&self.fail_create, err);
    }

    pub fn fail_lists(&self, err: BackendError) {
        arm(&self.fail_list, err);
    }

    pub fn insert(&self, collection: &CollectionRef, document: FileDocument) -> FileRecord {
        let record = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document,
            created_at: chrono::Utc::now(),
        };
        self.records.lock().unwrap().push((collection.clone(), record.clone()));
        record
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn create_document(
        &self,
        collection: &CollectionRef,
        document_id: &str,
        document: FileDocument,
    ) -> Result<FileRecord, BackendError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        fire(&self.fail_create)?;
        let record = FileRecord {
            id: document_id.to_string(),
            document,
            created_at: chrono::Utc::now(),
        };
        self.records.lock().unwrap().push((collection.clone(), record.clone()));
        Ok(record)
    }

    async fn list_documents(
        &self,
        collection: &CollectionRef,
        queries: &[Query],
    ) -> Result<Vec<FileRecord>, BackendError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        fire(&self.fail_list)?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, r)| c == collection && queries.iter().all(|q| q.matches(&r.document)))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
