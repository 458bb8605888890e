use serde::{Deserialize, Serialize};

use crate::flash::Flash;

/// Login form submission.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub flash: Option<Flash>,
}
