use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// S3-compatible object storage used for listing and avatar images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base for durable object URLs handed back to clients.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Marks session cookies `Secure`.
    pub production: bool,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
}

const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 7;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "estate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "estate-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_TTL_MINUTES),
        };

        let endpoint =
            std::env::var("STORAGE_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into());
        let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "listings".into());
        let public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("STORAGE_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("STORAGE_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse::<u16>().context("PORT must be a valid port number")?,
            Err(_) => 5000,
        };

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            production: std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            jwt,
            storage,
        })
    }
}
