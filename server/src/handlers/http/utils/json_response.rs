use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use tracing::{debug, warn};

pub type ResponseBody = BoxBody<Bytes, Infallible>;

pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into()).boxed()
}

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().boxed()
}

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// This is the primary helper all handlers should use.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<ResponseBody>> {
    let json = serde_json::to_string(data).context("Failed to serialize response")?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))
}

/// Delivers a JSON error response with the specified error code, message, and status.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<ResponseBody>> {
    warn!(
        "Delivering error JSON: {} - {} ({})",
        status.as_u16(),
        error_code,
        message
    );

    deliver_serialized_json(
        &json!({
            "status": "error",
            "code": error_code,
            "message": message
        }),
        status,
    )
}

/// Delivers `{"status":"success","message":..}` plus any extra top-level
/// fields from `extra` (which must be a JSON object if present).
pub fn deliver_success_json(
    message: &str,
    extra: Option<serde_json::Value>,
    status: StatusCode,
) -> Result<Response<ResponseBody>> {
    let mut body = json!({
        "status": "success",
        "message": message,
    });

    if let (Some(serde_json::Value::Object(extra)), Some(map)) = (extra, body.as_object_mut()) {
        map.extend(extra);
    }

    deliver_serialized_json(&body, status)
}

/// Plain-text 500 used when even the JSON error path has failed.
pub fn internal_error_fallback() -> Response<ResponseBody> {
    let mut res = Response::new(full(
        r#"{"status":"error","code":"INTERNAL_ERROR","message":"An internal error occurred"}"#,
    ));
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    res
}
