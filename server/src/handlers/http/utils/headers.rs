use anyhow::{Result, anyhow};
use certreg_shared::types::server_config::CorsConfig;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tracing::debug;

use super::json_response::{ResponseBody, empty};

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const CORS_MAX_AGE: &str = "86400";
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| {
        debug!("Retrieved header: {}", name);
        s.to_string()
    })
}

/// Extract the client IP address from proxy headers
pub fn get_client_ip<B>(req: &Request<B>) -> Option<String> {
    if let Some(forwarded) = get_header_value(req.headers(), "x-forwarded-for") {
        return forwarded.split(',').next().map(|s| s.trim().to_string());
    }

    get_header_value(req.headers(), "x-real-ip")
}

/// Origin to reflect back, if the request carried one and it is allowed.
pub fn allowed_origin(headers: &HeaderMap, cors: &CorsConfig) -> Option<HeaderValue> {
    let origin = headers.get(header::ORIGIN)?;
    let origin_str = origin.to_str().ok()?;
    if cors.allows(origin_str) {
        Some(origin.clone())
    } else {
        debug!("Origin not allowed: {}", origin_str);
        None
    }
}

/// Add the CORS headers every response carries for an allowed origin.
pub fn add_cors_headers<T>(mut res: Response<T>, origin: Option<HeaderValue>) -> Response<T> {
    let Some(origin) = origin else {
        return res;
    };

    let headers = res.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(CORS_MAX_AGE),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    res
}

/// 204 answer to an `OPTIONS` preflight.
pub fn preflight_response(
    request_headers: &HeaderMap,
    origin: Option<HeaderValue>,
) -> Result<Response<ResponseBody>> {
    let allow_headers = request_headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_HEADERS));

    let res = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, CORS_ALLOW_METHODS)
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers)
        .body(empty())
        .map_err(|e| anyhow!("Failed to build preflight response: {}", e))?;

    Ok(add_cors_headers(res, origin))
}
