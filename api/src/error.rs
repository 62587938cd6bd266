//! HTTP mapping for everything a handler can fail with.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use booking::{CatalogError, StoreError};
use reservation::ReservationError;

use crate::envelope::ErrorBody;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    reason: String,
    /// Logged for 5xx, never sent to the client.
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status,
            code,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn bad_request(code: &'static str, reason: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, reason)
    }

    pub fn login_required() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Please login")
    }

    pub fn not_admin() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "not_admin",
            "You don't have permission to create event",
        )
    }

    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_failure",
            "Internal error, please retry later",
        )
        .with_source(source)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<ReservationError> for ApiError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::StorageFailure(inner) => Self::internal(inner),
            other => Self::bad_request(other.code(), other.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        let code = match &e {
            CatalogError::NameTaken(_) => "name_taken",
            CatalogError::EventNotFound(_) => "event_not_found",
            CatalogError::CategoryNotFound(_) => "category_not_found",
            CatalogError::InvalidField { .. } => "invalid_field",
            CatalogError::CapacityBelowReserved { .. } => "capacity_below_reserved",
            CatalogError::Store(_) => "storage_failure",
        };

        match e {
            CatalogError::Store(inner) => Self::internal(inner),
            CatalogError::NameTaken(_) => Self::bad_request(code, "Event already exists"),
            CatalogError::EventNotFound(_) => Self::bad_request(code, "Event does not exist"),
            other => Self::bad_request(code, other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::internal(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request("invalid_body", e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::bad_request("invalid_path", e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request("invalid_query", e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "request failed"
                ),
                None => tracing::error!(status = %self.status, code = self.code, "request failed"),
            }
        } else {
            tracing::debug!(status = %self.status, code = self.code, reason = %self.reason, "request rejected");
        }

        let body = ErrorBody {
            status: "error",
            code: self.code,
            reason: &self.reason,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_failures_are_bad_requests() {
        let e: ApiError = ReservationError::CapacityExhausted.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "capacity_exhausted");
        assert_eq!(e.reason(), "Event registration full");

        let e: ApiError = ReservationError::Contention { attempts: 3 }.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "contention");
    }

    #[test]
    fn storage_failure_is_500_without_detail() {
        let e: ApiError =
            ReservationError::StorageFailure(StoreError::Corrupt("secret row".into())).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.reason().contains("secret"));
    }

    #[test]
    fn catalog_errors_map_to_client_messages() {
        let e: ApiError = CatalogError::NameTaken("x".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.reason(), "Event already exists");

        let e: ApiError = CatalogError::CapacityBelowReserved {
            requested: 1,
            reserved: 4,
        }
        .into();
        assert_eq!(e.code(), "capacity_below_reserved");
    }
}
