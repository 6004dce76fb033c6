use super::kind::{construct_file_url, get_file_type};
use super::{handle_error, FileError, FileService};
use crate::backend::InputFile;
use crate::models::{FileDocument, FileRecord};

pub struct UploadFile {
    pub file: InputFile,
    pub owner_id: String,
    pub account_id: String,
    /// View to revalidate once the record exists.
    pub path: String,
}

impl FileService {
    /// Stores the binary, then its metadata record.
    ///
    /// The two writes go to independent systems. When the record write fails
    /// the binary is deleted again before the error is returned; if that delete
    /// fails too, its error is returned instead and the binary stays orphaned.
    pub async fn upload_file(&self, req: UploadFile) -> Result<FileRecord, FileError> {
        let bucket_id = &self.settings.bucket_id;
        let bucket_file = self
            .bucket
            .create_file(bucket_id, &uuid::Uuid::new_v4().to_string(), req.file)
            .await
            .map_err(|e| handle_error(FileError::Upload(e)))?;

        let (kind, extension) = get_file_type(&bucket_file.name);
        let document = FileDocument {
            kind,
            url: construct_file_url(&self.settings.public_base_url, &bucket_file.id, &bucket_file.name),
            name: bucket_file.name.clone(),
            extension,
            size: bucket_file.size_original,
            owner: req.owner_id,
            account_id: req.account_id,
            users: Vec::new(),
            bucket_file_id: bucket_file.id.clone(),
        };

        let created = self
            .documents
            .create_document(&self.settings.collection, &uuid::Uuid::new_v4().to_string(), document)
            .await;
        let record = match created {
            Ok(record) => record,
            Err(e) => {
                log::warn!("removing bucket file {} after document write failed", bucket_file.id);
                self.bucket
                    .delete_file(bucket_id, &bucket_file.id)
                    .await
                    .map_err(|e| handle_error(FileError::Upload(e)))?;
                return Err(handle_error(FileError::CreateDocument(e)));
            }
        };

        self.views.revalidate(&req.path);
        log::info!("uploaded {} ({} bytes) as {}", record.document.name, record.document.size, record.id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBucket, MemoryDocuments, MemoryIdentity};
    use crate::backend::{BackendError, CollectionRef};
    use crate::cache::ViewCache;
    use crate::files::StorageSettings;
    use crate::models::{FileList, FileType};
    use std::sync::Arc;

    struct Harness {
        service: FileService,
        bucket: Arc<MemoryBucket>,
        documents: Arc<MemoryDocuments>,
        views: Arc<ViewCache>,
    }

    fn harness() -> Harness {
        let bucket = Arc::new(MemoryBucket::default());
        let documents = Arc::new(MemoryDocuments::default());
        let views = Arc::new(ViewCache::new());
        let service = FileService::new(
            Arc::new(MemoryIdentity::default()),
            bucket.clone(),
            documents.clone(),
            views.clone(),
            StorageSettings {
                bucket_id: "files".into(),
                collection: CollectionRef { database_id: "db".into(), collection_id: "files".into() },
                public_base_url: "http://host".into(),
            },
        );
        Harness { service, bucket, documents, views }
    }

    fn request(name: &str, body: &'static [u8]) -> UploadFile {
        UploadFile {
            file: InputFile::from_buffer(body, name),
            owner_id: "U1".into(),
            account_id: "acct-U1".into(),
            path: "/".into(),
        }
    }

    #[actix_web::test]
    async fn upload_writes_binary_and_record() {
        let h = harness();
        h.views.put("/", "acct-U1", FileList { total: 0, documents: Vec::new() });

        let record = h.service.upload_file(request("Photo.PNG", b"\x89PNG....")).await.unwrap();

        assert_eq!(record.document.kind, FileType::Image);
        assert_eq!(record.document.extension, "png");
        assert_eq!(record.document.name, "Photo.PNG");
        assert_eq!(record.document.size, 8);
        assert_eq!(record.document.owner, "U1");
        assert_eq!(record.document.account_id, "acct-U1");
        assert!(record.document.users.is_empty());
        assert_eq!(
            record.document.url,
            format!("http://host/files/{}/Photo.PNG", record.document.bucket_file_id)
        );
        assert!(h.bucket.contains(&record.document.bucket_file_id));
        assert_eq!(h.documents.len(), 1);
        assert!(h.views.get("/", "acct-U1").is_none());
    }

    #[actix_web::test]
    async fn failed_record_write_deletes_binary() {
        let h = harness();
        h.views.put("/", "acct-U1", FileList { total: 0, documents: Vec::new() });
        h.documents.fail_creates(BackendError::Rejected("schema mismatch".into()));

        let err = h.service.upload_file(request("a.pdf", b"%PDF")).await.unwrap_err();

        assert!(matches!(err, FileError::CreateDocument(_)));
        assert!(err.to_string().starts_with("failed to create file document"));
        assert_eq!(h.bucket.len(), 0);
        assert_eq!(h.bucket.deletes(), 1);
        assert_eq!(h.documents.len(), 0);
        // nothing changed, so cached views stay
        assert!(h.views.get("/", "acct-U1").is_some());
    }

    #[actix_web::test]
    async fn failed_compensation_surfaces_delete_error() {
        let h = harness();
        h.documents.fail_creates(BackendError::Rejected("schema mismatch".into()));
        h.bucket.fail_deletes(BackendError::Storage("bucket offline".into()));

        let err = h.service.upload_file(request("a.pdf", b"%PDF")).await.unwrap_err();

        assert!(matches!(err, FileError::Upload(BackendError::Storage(_))));
        assert_eq!(h.bucket.len(), 1);
        assert_eq!(h.documents.len(), 0);
    }

    #[actix_web::test]
    async fn failed_binary_write_skips_record() {
        let h = harness();
        h.bucket.fail_creates(BackendError::Storage("disk full".into()));

        let err = h.service.upload_file(request("a.pdf", b"%PDF")).await.unwrap_err();

        assert!(matches!(err, FileError::Upload(_)));
        assert_eq!(h.documents.creates(), 0);
    }
}
