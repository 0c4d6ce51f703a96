use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub email_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub username: String,
    pub password: String,
    pub from: String,
    pub sender_name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    pub times: u32,
    pub seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            algorithm: std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            access_ttl_minutes: env_i64("JWT_ACCESS_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
            email_ttl_minutes: env_i64("JWT_EMAIL_TTL_MINUTES", 60 * 24),
        };
        let mail = MailConfig {
            username: std::env::var("MAIL_USERNAME")?,
            password: std::env::var("MAIL_PASSWORD")?,
            from: std::env::var("MAIL_FROM")?,
            sender_name: std::env::var("MAIL_SENDER_NAME")
                .unwrap_or_else(|_| "Contact Book".into()),
            host: std::env::var("MAIL_SERVER")?,
            port: std::env::var("MAIL_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(465),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let rate_limit = RateLimitConfig {
            times: std::env::var("RATE_LIMIT_TIMES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            seconds: std::env::var("RATE_LIMIT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        };
        Ok(Self {
            database_url,
            jwt,
            mail,
            storage,
            rate_limit,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
