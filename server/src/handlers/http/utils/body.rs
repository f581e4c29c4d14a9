use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Largest request body the API will read.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("request body is not valid: {0}")]
    Invalid(String),
}

/// Read the request body and decode it as JSON, or as an urlencoded form
/// when the client says so. An empty body decodes as `{}`.
pub async fn parse_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, BodyError> {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| BodyError::Read(e.to_string()))?
        .to_bytes();

    debug!("Read request body: {} bytes (form: {})", bytes.len(), is_form);
    decode_body(&bytes, is_form)
}

pub fn decode_body<T: DeserializeOwned>(bytes: &Bytes, is_form: bool) -> Result<T, BodyError> {
    if is_form {
        let map: serde_json::Map<String, serde_json::Value> = form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        return serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| BodyError::Invalid(e.to_string()));
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_str("{}").map_err(|e| BodyError::Invalid(e.to_string()));
    }

    serde_json::from_slice(bytes).map_err(|e| BodyError::Invalid(e.to_string()))
}

/// Parse the URI query string into a map.
pub fn query_params<B>(req: &Request<B>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
