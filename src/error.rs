use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum PollsError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] figment::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<argon2::password_hash::Error> for PollsError {
    fn from(e: argon2::password_hash::Error) -> Self {
        PollsError::PasswordHash(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PollsError {
    fn from(e: tokio::task::JoinError) -> Self {
        PollsError::UnexpectedError(format!("blocking task failed: {e}"))
    }
}

impl IntoResponse for PollsError {
    fn into_response(self) -> axum::response::Response {
        let (status, title, detail) = match self {
            PollsError::NotFound => (
                StatusCode::NOT_FOUND,
                "Not Found",
                "The requested resource was not found on this server.",
            ),
            PollsError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "You do not have permission to access this page.",
            ),
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error",
                    "An internal server error occurred.",
                )
            }
        };
        (
            status,
            Html(format!("<h1>{title}</h1>\n<p>{detail}</p>\n")),
        )
            .into_response()
    }
}
