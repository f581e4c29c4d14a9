pub mod create;
pub mod users;
pub mod utils;

pub use create::create_tables;
pub use users::*;
pub use utils::*;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

/// Open a connection pool for `url`.
///
/// An in-memory database lives and dies with its connection, so for
/// `:memory:` URLs the pool is pinned to a single connection that never
/// idles out, whatever `pool_size` says.
pub async fn connect(url: &str, pool_size: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(pool_size)
    };

    let pool = options.connect(url).await?;
    info!("Connected to database: {}", url);
    Ok(pool)
}
