//! Cookie-carried session tokens. Signing and validation follow the usual
//! issuer/audience-checked JWT setup; the token travels in an HttpOnly cookie
//! because the surface is a redirect-driven form app, not a bearer-token API.

use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::flash::cookie_value;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "clinica_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
        }
    }
}

impl SessionKeys {
    pub fn sign(&self, user_id: i64, username: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, username, "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, "session verified");
        Ok(data.claims)
    }

    /// Set-Cookie value establishing the session.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.ttl.as_secs()
        )
    }

    /// Set-Cookie value tearing the session down.
    pub fn clear_cookie() -> String {
        format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
    }
}

/// Authenticated user for the current request. Rejection is a redirect to the
/// login page, so every protected handler gets the gate for free.
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Err(Redirect::to("/login"));
        };

        let keys = SessionKeys::from_ref(state);
        match keys.verify(&token) {
            Ok(claims) => Ok(CurrentUser {
                id: claims.sub,
                username: claims.username,
            }),
            Err(e) => {
                warn!(error = %e, "invalid or expired session");
                Err(Redirect::to("/login"))
            }
        }
    }
}
