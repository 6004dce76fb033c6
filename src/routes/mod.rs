pub mod auth;
pub mod files;
pub mod health;
pub mod users;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .service(web::scope("/auth")
                    .route("/sign-up", web::post().to(auth::sign_up))
                    .route("/sign-in", web::post().to(auth::sign_in))
                    .route("/verify", web::post().to(auth::verify))
                )
                .service(web::scope("/users")
                    .route("/me", web::get().to(users::me))
                )
                .service(web::scope("/files")
                    .route("", web::post().to(files::upload_file))
                    .route("", web::get().to(files::list_files))
                )
        )
        .route("/files/{id}/{filename:.*}", web::get().to(files::get_file));
}
