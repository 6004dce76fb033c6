use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub database_path: String,
    pub uploads_dir: String,
    pub jwt_secret: Option<String>,
    pub allowed_origins: Vec<String>,
    pub max_upload_size: usize,
    pub otp_ttl_secs: i64,
    /// Cached file listings kept before the cache is flushed.
    pub view_cache_capacity: usize,
    pub bucket_id: String,
    pub database_id: String,
    pub files_collection_id: String,
    /// Prefix for the `url` stored on file records.
    pub public_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:22900".to_string(),
            database_path: "./storeit.sqlite3".to_string(),
            uploads_dir: "./uploads".to_string(),
            jwt_secret: None,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_upload_size: 50 * 1024 * 1024,
            otp_ttl_secs: 15 * 60,
            view_cache_capacity: 1024,
            bucket_id: "files".to_string(),
            database_id: "storeit".to_string(),
            files_collection_id: "files".to_string(),
            public_base_url: "http://127.0.0.1:22900".to_string(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", config_path.display()))
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)
                .context("failed to serialize default config")?;
            std::fs::write(config_path, toml_string)
                .with_context(|| format!("failed to write {}", config_path.display()))?;
            log::info!("wrote default config to {}", config_path.display());
            Ok(default_config)
        }
    }

    pub fn from_env_config() -> anyhow::Result<Self> {
        let path = std::env::var("STOREIT_CONFIG").unwrap_or_else(|_| "config.toml".into());
        let mut final_cfg = Self::load(Path::new(&path))?;
        final_cfg.apply_env(|key| std::env::var(key).ok());

        if final_cfg.jwt_secret.is_none() {
            log::warn!("no jwt_secret configured, sessions will not survive a restart");
            final_cfg.jwt_secret = Some(uuid::Uuid::new_v4().to_string());
        }
        std::fs::create_dir_all(&final_cfg.uploads_dir)
            .with_context(|| format!("failed to create {}", final_cfg.uploads_dir))?;
        Ok(final_cfg)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("STOREIT_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = lookup("STOREIT_DATABASE_PATH") {
            self.database_path = v;
        }
        if let Some(v) = lookup("STOREIT_JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_deref().unwrap_or_default().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_written_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.bucket_id, "files");
        assert!(path.exists());

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.listen, cfg.listen);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:8080\"\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:8080");
        assert_eq!(cfg.files_collection_id, "files");
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = Config::default();
        cfg.apply_env(|key| match key {
            "STOREIT_LISTEN" => Some("0.0.0.0:1".into()),
            "STOREIT_JWT_SECRET" => Some("s3cret".into()),
            _ => None,
        });
        assert_eq!(cfg.listen, "0.0.0.0:1");
        assert_eq!(cfg.jwt_secret_bytes(), b"s3cret");
        assert_eq!(cfg.database_path, "./storeit.sqlite3");
    }
}
