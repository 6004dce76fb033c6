mod auth;
mod backend;
mod cache;
mod config;
mod db;
mod errors;
mod files;
mod forms;
mod models;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer};
use crate::backend::disk::DiskBucket;
use crate::backend::sqlite::{SqliteDocuments, SqliteIdentity};
use crate::backend::{IdentityProvider, LogDelivery};
use crate::cache::ViewCache;
use crate::config::Config;
use crate::db::Db;
use crate::files::{FileService, StorageSettings};
use actix_web::middleware::Logger;
use actix_web::http::header;
use actix_web::web::Data;
use env_logger::Env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_env_config()?;

    let db = Db::connect_and_migrate(&cfg.database_path).await?;

    let identity: Arc<dyn IdentityProvider> = Arc::new(SqliteIdentity::new(
        db.clone(),
        Arc::new(LogDelivery),
        chrono::Duration::seconds(cfg.otp_ttl_secs),
    ));
    let views = Data::new(ViewCache::with_capacity(cfg.view_cache_capacity));
    let files = Data::new(FileService::new(
        identity.clone(),
        Arc::new(DiskBucket::new(&cfg.uploads_dir)),
        Arc::new(SqliteDocuments::new(db)),
        views.clone().into_inner(),
        StorageSettings::from(&cfg),
    ));
    let identity = Data::from(identity);

    log::info!("Starting server at {}", cfg.listen);

    let listen_addr = cfg.listen.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);
        for origin in &cfg.allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(Data::new(cfg.clone()))
            .app_data(identity.clone())
            .app_data(files.clone())
            .app_data(views.clone())
            .configure(routes::configure)
    })
    .bind(listen_addr)?
    .run()
    .await?;
    Ok(())
}
