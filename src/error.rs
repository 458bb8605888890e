use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Domain error taxonomy. Validation variants are recovered at the handler
/// boundary and rendered back to the originating form; the rest map straight
/// to an HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidValue(String),

    #[error("CPF já cadastrado no sistema")]
    DuplicateKey,

    #[error("Não é permitido alterar o CPF")]
    ImmutableField,

    #[error("Registro não encontrado")]
    NotFound,

    #[error("Erro de banco de dados")]
    Persistence(#[from] sqlx::Error),
}

impl AppError {
    /// True for errors a user can fix by resubmitting the form.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidFormat(_)
                | AppError::InvalidValue(_)
                | AppError::DuplicateKey
                | AppError::ImmutableField
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            AppError::Persistence(e) => {
                error!(error = %e, "persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno, tente novamente".to_string(),
                )
                    .into_response()
            }
            other => (StatusCode::BAD_REQUEST, other.to_string()).into_response(),
        }
    }
}
