use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use crate::auth::password::hash_password;
use crate::config::AppConfig;

/// Login account. Seeded at setup time, never deleted in normal flow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
}

impl Usuario {
    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> anyhow::Result<Option<Usuario>> {
        let user = sqlx::query_as::<_, Usuario>(
            r#"
            SELECT id, username, password_hash, is_admin
            FROM usuarios
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &SqlitePool,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> anyhow::Result<Usuario> {
        let user = sqlx::query_as::<_, Usuario>(
            r#"
            INSERT INTO usuarios (username, password_hash, is_admin)
            VALUES (?, ?, ?)
            RETURNING id, username, password_hash, is_admin
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

/// Create the admin account from ADMIN_USERNAME/ADMIN_PASSWORD when it does
/// not exist yet. A no-op without both variables.
pub async fn seed_admin(db: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };
    if Usuario::find_by_username(db, username).await?.is_some() {
        return Ok(());
    }
    let hash = hash_password(password)?;
    let user = Usuario::create(db, username, &hash, true).await?;
    info!(user_id = user.id, username = %user.username, "admin user seeded");
    Ok(())
}
