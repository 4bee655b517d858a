#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use log::{error, warn};
#[cfg(feature = "web")]
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::database::StoreError;
use crate::login::AuthError;
use crate::mailer::MailError;
use crate::order::OrderError;
use crate::support::SupportError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Support(#[from] SupportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Operator access required")]
    Forbidden,
}

#[cfg(feature = "web")]
impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Catalog(CatalogError::ProductNotFound(_))
            | AppError::Cart(CartError::LineNotFound(_))
            | AppError::Order(OrderError::NotFound(_))
            | AppError::Support(SupportError::NotFound(_))
            | AppError::Auth(AuthError::EmailNotFound)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            AppError::Order(
                OrderError::NotCancellable(_)
                | OrderError::InvalidTransition { .. }
                | OrderError::NotPending(_)
                | OrderError::NotCompleted
                | OrderError::FeedbackExists,
            )
            | AppError::Auth(AuthError::EmailTaken) => StatusCode::CONFLICT,

            AppError::Auth(AuthError::Unauthenticated | AuthError::InvalidCredentials) => {
                StatusCode::UNAUTHORIZED
            }

            AppError::Forbidden => StatusCode::FORBIDDEN,

            AppError::Store(_)
            | AppError::Mail(_)
            | AppError::Config(_)
            | AppError::Auth(AuthError::Hashing) => StatusCode::INTERNAL_SERVER_ERROR,

            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("Request failed: {self}");
        } else if matches!(status, StatusCode::FORBIDDEN) {
            warn!("Rejected operator request");
        }

        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
