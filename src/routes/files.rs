use crate::{auth::AuthUser, backend::InputFile, cache::ViewCache, config::Config, errors::ApiError};
use crate::files::{FileService, UploadFile};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use futures_util::TryStreamExt as _;
use sanitize_filename::sanitize;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ViewPath {
    #[serde(default = "root_path")]
    pub path: String,
}

fn root_path() -> String {
    "/".into()
}

pub async fn upload_file(
    cfg: web::Data<Config>,
    files: web::Data<FileService>,
    user: AuthUser,
    query: web::Query<ViewPath>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let owner = files.current_user(Some(&user)).await?;

    let mut input: Option<InputFile> = None;
    while let Some(item) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        input = Some(read_multipart_file(&cfg, item).await?);
        break;
    }
    let file = input.ok_or(ApiError::BadRequest("no file part".into()))?;

    let record = files
        .upload_file(UploadFile {
            file,
            owner_id: owner.id,
            account_id: owner.account_id,
            path: query.into_inner().path,
        })
        .await?;
    Ok(HttpResponse::Created().json(record))
}

async fn read_multipart_file(
    cfg: &Config,
    mut field: actix_multipart::Field,
) -> Result<InputFile, ApiError> {
    let original = field
        .content_disposition()
        .and_then(|cd| cd.get_filename().map(|s| s.to_string()))
        .unwrap_or_else(|| "upload.bin".into());
    let mut name = sanitize(&original);
    if name.is_empty() {
        name = "upload.bin".into();
    }
    let mut data: Vec<u8> = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > cfg.max_upload_size {
            return Err(ApiError::PayloadTooLarge);
        }
    }
    Ok(InputFile::from_buffer(data, name))
}

pub async fn list_files(
    files: web::Data<FileService>,
    views: web::Data<ViewCache>,
    user: Option<AuthUser>,
    query: web::Query<ViewPath>,
) -> Result<HttpResponse, ApiError> {
    if let Some(session) = &user {
        if let Some(cached) = views.get(&query.path, &session.account_id) {
            return Ok(HttpResponse::Ok().json(cached));
        }
    }
    let list = files.get_files(user.as_ref()).await?;
    if let Some(session) = &user {
        views.put(&query.path, &session.account_id, list.clone());
    }
    Ok(HttpResponse::Ok().json(list))
}

// The filename segment is cosmetic; lookup is by bucket file id only.
pub async fn get_file(
    files: web::Data<FileService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, _filename) = path.into_inner();

    let (object, bytes) = files
        .bucket()
        .get_file(&files.settings().bucket_id, &id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mime = object.mime_type.as_deref().unwrap_or("application/octet-stream");
    Ok(HttpResponse::Ok()
        .content_type(mime)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(object.name.clone())],
        })
        .body(bytes))
}
