use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VetError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(myvet::io))]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(myvet::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("{0} not found")]
    #[diagnostic(code(myvet::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(
        code(myvet::validation),
        help("Correct the submitted fields and try again")
    )]
    Validation(String),

    #[error("Authentication required")]
    #[diagnostic(code(myvet::unauthorized))]
    Unauthorized,

    #[error("Access denied")]
    #[diagnostic(code(myvet::forbidden))]
    Forbidden,

    #[error("{0}")]
    #[diagnostic(code(myvet::other))]
    Other(String),
}

impl VetError {
    pub fn not_found(what: &str, id: i32) -> Self {
        VetError::NotFound(format!("{what} {id}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            VetError::NotFound(_) => StatusCode::NOT_FOUND,
            VetError::Validation(_) => StatusCode::BAD_REQUEST,
            VetError::Unauthorized => StatusCode::UNAUTHORIZED,
            VetError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON rendering, used by the `/api` surface. HTML handlers render their own pages.
impl IntoResponse for VetError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
