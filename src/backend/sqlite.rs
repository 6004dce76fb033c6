use super::{
    BackendError, CollectionRef, DocumentStore, IdentityProvider, SecretDelivery,
    MAX_SECRET_ATTEMPTS,
};
use crate::auth::{self, AuthUser};
use crate::db::Db;
use crate::files::query::Query;
use crate::models::{AccountRef, FileDocument, FileRecord, FileType, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, account_id, email, full_name, created_at";

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        account_id: row.get("account_id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        created_at: row.get("created_at"),
    }
}

/// Users and their pending email secrets, kept in SQLite.
pub struct SqliteIdentity {
    db: Db,
    delivery: Arc<dyn SecretDelivery>,
    secret_ttl: Duration,
}

impl SqliteIdentity {
    pub fn new(db: Db, delivery: Arc<dyn SecretDelivery>, secret_ttl: Duration) -> Self {
        Self { db, delivery, secret_ttl }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, BackendError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.db.0)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_user(&self, full_name: &str, email: &str) -> Result<User, BackendError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            created_at: Utc::now(),
        };
        let res = sqlx::query("INSERT INTO users(id, account_id, email, full_name, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.account_id)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(user.created_at)
            .execute(&self.db.0)
            .await;

        if let Err(e) = res {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.message().contains("UNIQUE") {
                    // registered concurrently
                    return self
                        .find_by_email(email)
                        .await?
                        .ok_or_else(|| BackendError::NotFound("user".into()));
                }
            }
            return Err(e.into());
        }
        log::info!("created account {} for {}", user.account_id, user.email);
        Ok(user)
    }

    /// Replaces any pending secret for the account and delivers the new one.
    async fn send_email_secret(&self, account_id: &str, email: &str) -> Result<(), BackendError> {
        let secret = auth::generate_email_secret();
        let hash = auth::hash_secret(&secret).map_err(|e| BackendError::Storage(e.to_string()))?;
        let expires_at = Utc::now() + self.secret_ttl;

        sqlx::query(
            "INSERT INTO email_secrets(account_id, secret_hash, attempts, expires_at) VALUES (?, ?, 0, ?)
             ON CONFLICT(account_id) DO UPDATE SET secret_hash = excluded.secret_hash, attempts = 0, expires_at = excluded.expires_at",
        )
        .bind(account_id)
        .bind(&hash)
        .bind(expires_at)
        .execute(&self.db.0)
        .await?;

        self.delivery.deliver(email, &secret).await
    }

    async fn delete_secret(&self, account_id: &str) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM email_secrets WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.db.0)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentity {
    async fn create_account(&self, full_name: &str, email: &str) -> Result<AccountRef, BackendError> {
        let user = match self.find_by_email(email).await? {
            Some(existing) => existing,
            None => self.insert_user(full_name, email).await?,
        };
        self.send_email_secret(&user.account_id, &user.email).await?;
        Ok(AccountRef { account_id: user.account_id })
    }

    async fn sign_in_user(&self, email: &str) -> Result<AccountRef, BackendError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| BackendError::NotFound("user".into()))?;
        self.send_email_secret(&user.account_id, &user.email).await?;
        Ok(AccountRef { account_id: user.account_id })
    }

    async fn verify_secret(&self, account_id: &str, secret: &str) -> Result<User, BackendError> {
        let row = sqlx::query("SELECT secret_hash, expires_at FROM email_secrets WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.db.0)
            .await?;
        let row = row.ok_or_else(|| BackendError::Rejected("no pending secret".into()))?;
        let secret_hash: String = row.get("secret_hash");
        let expires_at: DateTime<Utc> = row.get("expires_at");

        if Utc::now() > expires_at {
            self.delete_secret(account_id).await?;
            return Err(BackendError::Rejected("secret expired".into()));
        }
        if !auth::verify_secret(&secret_hash, secret) {
            let attempts: i64 = sqlx::query_scalar(
                "UPDATE email_secrets SET attempts = attempts + 1 WHERE account_id = ? RETURNING attempts",
            )
            .bind(account_id)
            .fetch_one(&self.db.0)
            .await?;
            if attempts >= MAX_SECRET_ATTEMPTS {
                log::warn!("discarding email secret for {account_id} after {attempts} failed attempts");
                self.delete_secret(account_id).await?;
            }
            return Err(BackendError::Rejected("invalid secret".into()));
        }
        self.delete_secret(account_id).await?;

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE account_id = ?"))
            .bind(account_id)
            .fetch_optional(&self.db.0)
            .await?;
        row.as_ref()
            .map(user_from_row)
            .ok_or_else(|| BackendError::NotFound("user".into()))
    }

    async fn get_current_user(&self, session: Option<&AuthUser>) -> Result<Option<User>, BackendError> {
        let Some(session) = session else {
            return Ok(None);
        };
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE account_id = ?"))
            .bind(&session.account_id)
            .fetch_optional(&self.db.0)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }
}

/// File metadata records, one row per document.
pub struct SqliteDocuments {
    db: Db,
}

impl SqliteDocuments {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn record_from_row(row: &SqliteRow) -> Result<FileRecord, BackendError> {
    let kind: String = row.get("type");
    let users: String = row.get("users");
    Ok(FileRecord {
        id: row.get("id"),
        document: FileDocument {
            kind: FileType::parse(&kind)
                .ok_or_else(|| BackendError::Storage(format!("unknown file type {kind}")))?,
            name: row.get("name"),
            url: row.get("url"),
            extension: row.get("extension"),
            size: row.get("size"),
            owner: row.get("owner"),
            account_id: row.get("account_id"),
            users: serde_json::from_str(&users).map_err(|e| BackendError::Storage(e.to_string()))?,
            bucket_file_id: row.get("bucket_file_id"),
        },
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl DocumentStore for SqliteDocuments {
    async fn create_document(
        &self,
        collection: &CollectionRef,
        document_id: &str,
        document: FileDocument,
    ) -> Result<FileRecord, BackendError> {
        let users = serde_json::to_string(&document.users).map_err(|e| BackendError::Storage(e.to_string()))?;
        let created_at = Utc::now();

        sqlx::query("INSERT INTO file_documents(id, database_id, collection_id, type, name, url, extension, size, owner, account_id, users, bucket_file_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(document_id)
            .bind(&collection.database_id)
            .bind(&collection.collection_id)
            .bind(document.kind.as_str())
            .bind(&document.name)
            .bind(&document.url)
            .bind(&document.extension)
            .bind(document.size)
            .bind(&document.owner)
            .bind(&document.account_id)
            .bind(&users)
            .bind(&document.bucket_file_id)
            .bind(created_at)
            .execute(&self.db.0)
            .await?;

        Ok(FileRecord { id: document_id.to_string(), document, created_at })
    }

    async fn list_documents(
        &self,
        collection: &CollectionRef,
        queries: &[Query],
    ) -> Result<Vec<FileRecord>, BackendError> {
        let mut sql = String::from(
            "SELECT id, type, name, url, extension, size, owner, account_id, users, bucket_file_id, created_at
             FROM file_documents WHERE database_id = ? AND collection_id = ?",
        );
        let mut binds = Vec::new();
        for q in queries {
            sql.push_str(" AND ");
            sql.push_str(&q.to_sql(&mut binds));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query(&sql)
            .bind(&collection.database_id)
            .bind(&collection.collection_id);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query.fetch_all(&self.db.0).await?;
        rows.iter().map(record_from_row).collect()
    }
}
