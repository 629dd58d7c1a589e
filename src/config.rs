use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Lifetime of the presigned GET url handed to the relay.
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipdropConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub clipdrop: ClipdropConfig,
    pub production: bool,
    pub cors_origin: Option<String>,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "imagify".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "imagify-users".into()),
            ttl_minutes: env_number("ACCESS_TOKEN_TTL_MINUTES").unwrap_or(15),
            refresh_ttl_minutes: env_number("REFRESH_TOKEN_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")?,
            bucket: std::env::var("MINIO_BUCKET")?,
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            url_ttl_secs: env_number("MINIO_URL_TTL_SECS").unwrap_or(10 * 60),
        };
        let clipdrop = ClipdropConfig {
            base_url: std::env::var("CLIPDROP_BASE_URL")
                .unwrap_or_else(|_| "https://clipdrop-api.co".into()),
            api_key: std::env::var("CLIPDROP_API_KEY")?,
        };
        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty());
        let upload_dir = std::env::var("UPLOAD_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Ok(Self {
            database_url,
            jwt,
            storage,
            clipdrop,
            production,
            cors_origin,
            upload_dir,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
