//! Request extractors whose rejections render like every other API error.
//!
//! axum's own `Json`, `Path` and `Query` reject with a plain-text body. These wrappers
//! run the same extraction and turn the rejection into an [`ApiError`], so a malformed
//! body, id or query string still gets a `{"message": ...}` JSON response.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
