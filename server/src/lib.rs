//! HTTP auth and account service for the certificate registration system.

pub mod database;
pub mod handlers;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use certreg_shared::auth::{Role, TokenService};
use certreg_shared::config::LiveConfig;
use certreg_shared::types::{AppConfig, NewUser};

use handlers::http::Router;
use handlers::http::utils::internal_error_fallback;

/// Everything a handler needs. Cheap to clone per request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: LiveConfig,
    pub db: SqlitePool,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Build the token service, open the database, create the schema and
    /// seed the bootstrap admin.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let secret = config
            .auth
            .resolved_jwt_secret()
            .context("No signing secret configured (set JWT_SECRET or auth.jwt_secret)")?;
        let tokens = TokenService::new(secret).context("Failed to build token service")?;

        let db = database::connect(&config.database.url, config.database.pool_size)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        database::create_tables(&db)
            .await
            .context("Failed to create database schema")?;

        seed_bootstrap_admin(&db, &config).await?;

        Ok(Self {
            config: LiveConfig::new(config),
            db,
            tokens: Arc::new(tokens),
        })
    }
}

/// Create the configured admin account when the `users` table is empty.
async fn seed_bootstrap_admin(db: &SqlitePool, config: &AppConfig) -> Result<()> {
    let Some(admin) = &config.auth.bootstrap_admin else {
        return Ok(());
    };

    let existing = database::count_users(db)
        .await
        .context("Failed to count users")?;
    if existing > 0 {
        debug!("{} users present, skipping bootstrap admin", existing);
        return Ok(());
    }

    let id = database::create_user(
        db,
        &NewUser {
            username: admin.username.clone(),
            password: admin.password.clone(),
            full_name: admin.full_name.clone(),
            email: admin.email.clone(),
            role: Role::Admin,
        },
    )
    .await
    .context("Failed to create bootstrap admin")?;

    info!("Created bootstrap admin {} (ID: {})", admin.username, id);
    Ok(())
}

/// Accept connections on `listener` until the task is dropped.
///
/// At most `max_connections` connections are served at once; further
/// accepts wait for a slot.
pub async fn serve(listener: TcpListener, state: AppState, max_connections: usize) -> Result<()> {
    let router = Arc::new(handlers::http::build_api_router());
    let slots = Arc::new(Semaphore::new(max_connections.max(1)));

    info!(
        "Listening on http://{}",
        listener.local_addr().context("Listener has no local address")?
    );

    loop {
        let permit = Arc::clone(&slots)
            .acquire_owned()
            .await
            .context("Connection semaphore closed")?;

        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("Accepted connection from {}", peer);

        let io = TokioIo::new(stream);
        let state = state.clone();
        let router = Arc::clone(&router);

        tokio::task::spawn(async move {
            let _permit = permit;
            let service = service_fn(move |req| {
                let state = state.clone();
                let router = Arc::clone(&router);
                async move { Ok::<_, Infallible>(respond(&router, req, state).await) }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

async fn respond(
    router: &Router,
    req: hyper::Request<hyper::body::Incoming>,
    state: AppState,
) -> hyper::Response<handlers::http::utils::ResponseBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match router.route(req, state).await {
        Ok(res) => {
            info!("{} {} -> {}", method, path, res.status().as_u16());
            res
        }
        Err(e) => {
            error!("{} {} failed: {:#}", method, path, e);
            internal_error_fallback()
        }
    }
}
