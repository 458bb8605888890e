//! One-shot status messages carried across a redirect in a short-lived
//! cookie, consumed by the next rendered view.

use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: "success".into(),
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: "danger".into(),
            message: message.into(),
        }
    }
}

/// Extract a single cookie value from the Cookie request header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// 303 redirect carrying a flash message for the next view.
pub fn redirect(to: &str, flash: Flash) -> Response {
    let encoded = urlencoding::encode(&format!("{}|{}", flash.level, flash.message)).into_owned();
    let cookie = format!("{}={}; Path=/; Max-Age=60", FLASH_COOKIE, encoded);
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie.parse().unwrap());
    (headers, Redirect::to(to)).into_response()
}

/// Read and clear the pending flash message, if any. The returned header map
/// expires the cookie and must be attached to the response.
pub fn take(headers: &HeaderMap) -> (Option<Flash>, HeaderMap) {
    let mut clear = HeaderMap::new();
    let Some(raw) = cookie_value(headers, FLASH_COOKIE) else {
        return (None, clear);
    };
    let expire = format!("{}=; Path=/; Max-Age=0", FLASH_COOKIE);
    clear.insert(header::SET_COOKIE, expire.parse().unwrap());

    let decoded = match urlencoding::decode(&raw) {
        Ok(v) => v.into_owned(),
        Err(_) => return (None, clear),
    };
    let flash = decoded.split_once('|').map(|(level, message)| Flash {
        level: level.to_string(),
        message: message.to_string(),
    });
    (flash, clear)
}
