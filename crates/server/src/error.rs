//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors are rendered as a JSON
//! [`ErrorBody`] with a stable `error` code; server errors are captured to
//! Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shopfront_core::{ErrorBody, RowError, RowErrors};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::db::{CartWriteError, RepositoryError};

/// Application-level error type for the backend.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Catalog write rejected or failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Cart write rejected or failed.
    #[error(transparent)]
    CartWrite(#[from] CartWriteError),

    /// Cart quantity outside the accepted range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or unknown bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) | Self::Catalog(CatalogError::Repository(err)) => {
                repository_status(err)
            }
            Self::CartWrite(CartWriteError::Repository(err)) => repository_status(err),
            Self::Catalog(CatalogError::InvalidProduct(_) | CatalogError::ValidationFailed(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Catalog(CatalogError::IngestInProgress(_))
            | Self::CartWrite(CartWriteError::InsufficientStock { .. }) => StatusCode::CONFLICT,
            Self::CartWrite(CartWriteError::ProductNotFound(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidQuantity(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Catalog(CatalogError::Task(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        let status = self.status();
        if status.is_server_error() {
            // Don't expose internal error details to clients
            return ErrorBody::new("internal", "Internal server error");
        }

        let code = match self {
            Self::Catalog(CatalogError::InvalidProduct(_) | CatalogError::ValidationFailed(_)) => {
                "validation_failed"
            }
            Self::Catalog(CatalogError::IngestInProgress(_)) => "ingest_in_progress",
            Self::CartWrite(CartWriteError::InsufficientStock {
                product_id,
                requested,
                available,
            }) => {
                return ErrorBody {
                    product_id: Some(*product_id),
                    requested: Some(*requested),
                    available: Some(*available),
                    ..ErrorBody::new("insufficient_stock", self.to_string())
                };
            }
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            _ if status == StatusCode::NOT_FOUND => "not_found",
            _ if status == StatusCode::CONFLICT => "conflict",
            _ => "bad_request",
        };
        ErrorBody::new(code, self.to_string())
    }

    /// Offending rows of a validation failure; single-product errors are row 0.
    fn rows(&self) -> Option<RowErrors> {
        match self {
            Self::Catalog(CatalogError::ValidationFailed(rows)) => Some(rows.clone()),
            Self::Catalog(CatalogError::InvalidProduct(errors)) => Some(RowErrors(vec![RowError {
                index: 0,
                errors: errors.clone(),
            }])),
            _ => None,
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = self.body();
        let mut json = serde_json::to_value(&body).unwrap_or_else(|_| serde_json::json!({}));
        if let (Some(rows), Some(object)) = (self.rows(), json.as_object_mut()) {
            object.insert(
                "rows".to_string(),
                serde_json::to_value(rows).unwrap_or_default(),
            );
        }

        (status, Json(json)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use shopfront_core::{FieldError, ProductId, StoreId};

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_insufficient_stock_body() {
        let (status, body) = render(AppError::CartWrite(CartWriteError::InsufficientStock {
            product_id: ProductId::new(3),
            requested: 4,
            available: 1,
        }))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "insufficient_stock");
        assert_eq!(body["product_id"], 3);
        assert_eq!(body["requested"], 4);
        assert_eq!(body["available"], 1);
    }

    #[tokio::test]
    async fn test_validation_failed_lists_rows() {
        let rows = RowErrors(vec![RowError {
            index: 2,
            errors: vec![FieldError::EmptyName],
        }]);
        let (status, body) = render(CatalogError::ValidationFailed(rows).into()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["rows"][0]["index"], 2);
        assert_eq!(body["rows"][0]["errors"][0]["code"], "empty_name");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = render(AppError::Database(RepositoryError::DataCorruption(
            "secret detail".to_string(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal");
        assert!(!body.to_string().contains("secret detail"));
    }

    #[tokio::test]
    async fn test_status_codes() {
        let cases = [
            (
                AppError::Catalog(CatalogError::IngestInProgress(StoreId::new(1))),
                StatusCode::CONFLICT,
                "ingest_in_progress",
            ),
            (
                AppError::Database(RepositoryError::NotFound),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                AppError::Unauthorized("no token".into()),
                StatusCode::UNAUTHORIZED,
                "unauthorized",
            ),
            (
                AppError::InvalidQuantity("0".into()),
                StatusCode::BAD_REQUEST,
                "invalid_quantity",
            ),
        ];
        for (err, expected_status, expected_code) in cases {
            let (status, body) = render(err).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["error"], expected_code);
        }
    }
}
