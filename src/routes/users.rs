use crate::{auth::AuthUser, backend::IdentityProvider, errors::ApiError};
use actix_web::{HttpResponse, web};

pub async fn me(
    identity: web::Data<dyn IdentityProvider>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let current = identity
        .get_current_user(Some(&user))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(current))
}
