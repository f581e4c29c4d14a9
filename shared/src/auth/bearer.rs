/// Scheme prefix of an `Authorization` header carrying a token. Matched
/// case-sensitively with exactly one space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Pull the token out of a raw `Authorization` header value.
///
/// Returns the run of non-whitespace characters following `"Bearer "`, or
/// `None` when the header is absent, uses another scheme or spelling, or
/// carries no token.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let rest = header?.strip_prefix(BEARER_PREFIX)?;
    let token = rest.split_whitespace().next()?;

    // "Bearer  abc" (two spaces) is not the single-space form.
    if !rest.starts_with(token) {
        return None;
    }

    Some(token)
}
