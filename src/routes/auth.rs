use crate::{auth, backend::{BackendError, IdentityProvider}, config::Config, errors::ApiError};
use crate::forms::{AuthFormController, AuthFormValues, AuthMode};
use crate::models::User;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

async fn submit_form(
    mode: AuthMode,
    identity: &dyn IdentityProvider,
    body: &AuthFormValues,
) -> Result<HttpResponse, ApiError> {
    let mut form = AuthFormController::new(mode);
    let values = form.validate(body).map_err(ApiError::Validation)?;
    form.submit(values, identity).await;

    let view = form.view();
    if view.error_message.is_some() {
        return Ok(HttpResponse::BadGateway().json(view));
    }
    Ok(HttpResponse::Ok().json(view))
}

pub async fn sign_up(
    identity: web::Data<dyn IdentityProvider>,
    body: web::Json<AuthFormValues>,
) -> Result<HttpResponse, ApiError> {
    submit_form(AuthMode::SignUp, identity.get_ref(), &body).await
}

pub async fn sign_in(
    identity: web::Data<dyn IdentityProvider>,
    body: web::Json<AuthFormValues>,
) -> Result<HttpResponse, ApiError> {
    submit_form(AuthMode::SignIn, identity.get_ref(), &body).await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReq {
    pub account_id: String,
    pub secret: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResp {
    access_token: String,
    user: User,
}

pub async fn verify(
    cfg: web::Data<Config>,
    identity: web::Data<dyn IdentityProvider>,
    body: web::Json<VerifyReq>,
) -> Result<HttpResponse, ApiError> {
    let user = match identity.verify_secret(&body.account_id, &body.secret).await {
        Ok(user) => user,
        Err(BackendError::Rejected(reason)) => {
            log::info!("secret rejected for {}: {reason}", body.account_id);
            return Err(ApiError::Unauthorized);
        }
        Err(BackendError::NotFound(_)) => return Err(ApiError::Unauthorized),
        Err(e) => return Err(e.into()),
    };
    let access_token = auth::create_access_token(&user.account_id, &cfg)?;
    Ok(HttpResponse::Ok().json(SessionResp { access_token, user }))
}
