//! JSON envelopes shared by every route.
//!
//! Success: `{"status":"success","data":...}`
//! Failure: `{"status":"error","code":"...","reason":"..."}`

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SuccessBody<T> {
    status: &'static str,
    data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub status: &'static str,
    pub code: &'a str,
    pub reason: &'a str,
}

/// Successful response with an explicit status code (200 unless changed).
#[derive(Debug)]
pub struct ApiSuccess<T> {
    status: StatusCode,
    data: T,
}

impl<T> ApiSuccess<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            status: "success",
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}
