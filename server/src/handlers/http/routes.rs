use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use certreg_shared::auth::{Role, TokenError, TokenService, extract_bearer};
use certreg_shared::types::{ErrorResponse, TokenClaims};

use crate::AppState;
use crate::handlers::http::utils::*;
use crate::handlers::http::{admin, auth};

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Three security tiers:
//
//   Open: no auth.  Receives (req, state).
//          Use for: /api/auth/login, /health.
//
//   Light: valid bearer token, any role.  Receives (req, state, claims).
//          Use for: verify / logout.
//
//   Gated: valid bearer token whose role meets a minimum.
//          Receives (req, state, claims).
//          Use for: everything under /api/admin.

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<ResponseBody>>> + Send>>;

type RouteHandler = Box<dyn Fn(Request<Incoming>, AppState) -> HandlerFuture + Send + Sync>;

type ClaimsHandler =
    Box<dyn Fn(Request<Incoming>, AppState, TokenClaims) -> HandlerFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

enum RouteKind {
    /// No authentication check.
    Open(RouteHandler),

    /// Token signature + expiry only.
    Light(ClaimsHandler),

    /// Token check, then `claims.role` must satisfy `required`.
    Gated {
        required: Role,
        handler: ClaimsHandler,
    },
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Why a request was turned away at the token check. Only ever logged;
/// the client always gets the same 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("missing or malformed Authorization header")]
    MissingToken,

    #[error("token rejected: {0}")]
    Token(#[from] TokenError),
}

impl AuthRejection {
    /// Short stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::Token(e) => e.kind(),
        }
    }
}

/// Pull the bearer token out of `headers` and verify it.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<TokenClaims, AuthRejection> {
    let header = get_header_value(headers, "authorization");
    let token = extract_bearer(header.as_deref()).ok_or(AuthRejection::MissingToken)?;
    Ok(tokens.verify(token)?)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn open<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    fn with_claims<F, Fut>(mut self, method: Method, path: &str, required: Option<Role>, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        let handler: ClaimsHandler =
            Box::new(move |req, state, claims| Box::pin(handler(req, state, claims)));
        let kind = match required {
            Some(required) => RouteKind::Gated { required, handler },
            None => RouteKind::Light(handler),
        };
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind,
        });
        self
    }

    // ── Open (no auth) ────────────────────────────────────────────────────────

    /// GET with no authentication.
    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.open(Method::GET, path, handler)
    }

    /// POST with no authentication. Login only.
    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.open(Method::POST, path, handler)
    }

    // ── Light (token only) ────────────────────────────────────────────────────

    pub fn post_light<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.with_claims(Method::POST, path, None, handler)
    }

    // ── Gated (token + minimum role) ──────────────────────────────────────────

    pub fn get_gated<F, Fut>(self, path: &str, required: Role, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.with_claims(Method::GET, path, Some(required), handler)
    }

    pub fn post_gated<F, Fut>(self, path: &str, required: Role, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.with_claims(Method::POST, path, Some(required), handler)
    }

    pub fn put_gated<F, Fut>(self, path: &str, required: Role, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.with_claims(Method::PUT, path, Some(required), handler)
    }

    pub fn delete_gated<F, Fut>(self, path: &str, required: Role, handler: F) -> Self
    where
        F: Fn(Request<Incoming>, AppState, TokenClaims) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.with_claims(Method::DELETE, path, Some(required), handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Answer one request. CORS headers are applied to every response,
    /// including errors.
    pub async fn route(&self, req: Request<Incoming>, state: AppState) -> Result<Response<ResponseBody>> {
        let origin = {
            let cfg = state.config.read().await;
            allowed_origin(req.headers(), &cfg.cors)
        };

        if req.method() == Method::OPTIONS {
            debug!("Preflight for {}", req.uri().path());
            return preflight_response(req.headers(), origin);
        }

        let response = match self.dispatch(req, state).await {
            Ok(res) => res,
            Err(e) => {
                error!("Handler failed: {:#}", e);
                deliver_error_json(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
                .unwrap_or_else(|_| internal_error_fallback())
            }
        };

        Ok(add_cors_headers(response, origin))
    }

    async fn dispatch(&self, req: Request<Incoming>, state: AppState) -> Result<Response<ResponseBody>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let mut path_known = false;

        for route in &self.routes {
            if !Self::path_matches(&route.path, &path) {
                continue;
            }
            path_known = true;
            if route.method != method {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(req, state).await,

                RouteKind::Light(h) => match authenticate(req.headers(), &state.tokens) {
                    Ok(claims) => h(req, state, claims).await,
                    Err(reason) => {
                        warn!(kind = reason.kind(), "Auth rejected {} {}: {}", method, path, reason);
                        unauthorized()
                    }
                },

                RouteKind::Gated { required, handler } => {
                    let claims = match authenticate(req.headers(), &state.tokens) {
                        Ok(claims) => claims,
                        Err(reason) => {
                            warn!(kind = reason.kind(), "Auth rejected {} {}: {}", method, path, reason);
                            return unauthorized();
                        }
                    };

                    if !claims.permits(*required) {
                        warn!(
                            "User {} (role {}) denied {} {}: requires {}",
                            claims.username, claims.role, method, path, required
                        );
                        return forbidden();
                    }

                    handler(req, state, claims).await
                }
            };
        }

        if path_known {
            return deliver_error_json(
                "METHOD_NOT_ALLOWED",
                "Method not allowed",
                StatusCode::METHOD_NOT_ALLOWED,
            )
            .context("Failed to deliver 405 response");
        }

        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unauthorized() -> Result<Response<ResponseBody>> {
    deliver_serialized_json(&ErrorResponse::unauthenticated(), StatusCode::UNAUTHORIZED)
        .context("Failed to deliver 401 response")
}

fn forbidden() -> Result<Response<ResponseBody>> {
    deliver_serialized_json(&ErrorResponse::forbidden(), StatusCode::FORBIDDEN)
        .context("Failed to deliver 403 response")
}

// ---------------------------------------------------------------------------
// API router
//
// Auth tier is enforced here at the routing level. Handlers MUST NOT repeat
// the token check.
// ---------------------------------------------------------------------------

pub fn build_api_router() -> Router {
    Router::new()
        // ── Open ─────────────────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(&json!({"status": "success", "health": "ok"}), StatusCode::OK)
        })
        .post("/api/auth/login", |req, state| async move {
            auth::handle_login(req, state).await.context("Login failed")
        })
        // ── Light: any valid token ───────────────────────────────────────────
        .post_light("/api/auth/verify", |req, state, claims| async move {
            auth::handle_verify(req, state, claims)
                .await
                .context("Verify failed")
        })
        .post_light("/api/auth/logout", |req, state, claims| async move {
            auth::handle_logout(req, state, claims)
                .await
                .context("Logout failed")
        })
        // ── Gated: admin only ────────────────────────────────────────────────
        .get_gated("/api/admin/users", Role::Admin, |req, state, claims| async move {
            admin::handle_list_users(req, state, claims)
                .await
                .context("List users failed")
        })
        .post_gated("/api/admin/users", Role::Admin, |req, state, claims| async move {
            admin::handle_create_user(req, state, claims)
                .await
                .context("Create user failed")
        })
        .put_gated("/api/admin/users", Role::Admin, |req, state, claims| async move {
            admin::handle_update_user(req, state, claims)
                .await
                .context("Update user failed")
        })
        .delete_gated("/api/admin/users", Role::Admin, |req, state, claims| async move {
            admin::handle_delete_user(req, state, claims)
                .await
                .context("Delete user failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
