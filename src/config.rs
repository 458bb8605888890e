use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://clinica.db".into());
        let secret = match std::env::var("SESSION_SECRET") {
            Ok(s) => s,
            Err(_) => {
                warn!("SESSION_SECRET not set, using insecure development secret");
                "chave_secreta_de_desenvolvimento".into()
            }
        };
        let session = SessionConfig {
            secret,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "clinica".into()),
            audience: std::env::var("SESSION_AUDIENCE").unwrap_or_else(|_| "clinica-users".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(8 * 60),
        };
        Ok(Self {
            database_url,
            session,
            admin_username: std::env::var("ADMIN_USERNAME").ok(),
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
        })
    }
}
