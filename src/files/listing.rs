use super::query::create_queries;
use super::{handle_error, FileError, FileService};
use crate::auth::AuthUser;
use crate::models::{FileList, User};

impl FileService {
    pub async fn current_user(&self, session: Option<&AuthUser>) -> Result<User, FileError> {
        self.identity
            .get_current_user(session)
            .await
            .map_err(|e| handle_error(FileError::List(e)))?
            .ok_or_else(|| handle_error(FileError::UserNotFound))
    }

    /// Records the current user owns or that were shared with their email.
    pub async fn get_files(&self, session: Option<&AuthUser>) -> Result<FileList, FileError> {
        let user = self.current_user(session).await?;
        let queries = create_queries(&user);

        let files = self
            .documents
            .list_documents(&self.settings.collection, &queries)
            .await
            .map_err(|e| handle_error(FileError::List(e)))?;
        Ok(files.into())
    }
}
