//! Scoped database sessions.
//!
//! A [`Session`] is a pooled connection checked out for one unit of work.
//! It goes back to the pool exactly once, when the session is dropped, on
//! every exit path: normal return, `?` early return, or unwinding panic.
//!
//! Handlers receive a session by naming it as an extractor argument:
//!
//! ```ignore
//! async fn handler(mut session: Session) -> Result<Json<User>, AppError> {
//!     let user = user_service::get_user(&mut session, id).await?;
//!     Ok(Json(user))
//! }
//! ```

use std::{
    ops::{Deref, DerefMut},
    time::Instant,
};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::{PgConnection, Postgres, pool::PoolConnection};

use crate::{
    db::{self, DbPool},
    error::AppError,
};

/// A pooled connection held for the duration of one unit of work.
#[derive(Debug)]
pub struct Session {
    conn: PoolConnection<Postgres>,
    acquired_at: Instant,
}

impl Session {
    /// Check a connection out of the pool.
    ///
    /// The pool pings an idle connection first and replaces it if it is dead.
    /// When the pool would have to open a new connection, the server is tried
    /// once directly, so an unreachable database fails fast with its connect
    /// error instead of being retried until the acquire timeout. A server
    /// that goes away between that check and the pooled connect is still
    /// bounded by `DATABASE_ACQUIRE_TIMEOUT`.
    pub async fn acquire(pool: &DbPool) -> Result<Self, AppError> {
        let would_connect =
            pool.num_idle() == 0 && pool.size() < pool.options().get_max_connections();
        if would_connect {
            db::check_reachable(pool).await?;
        }

        let conn = pool.acquire().await?;
        tracing::trace!("session acquired");

        Ok(Self {
            conn,
            acquired_at: Instant::now(),
        })
    }
}

impl Deref for Session {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The inner PoolConnection returns itself to the pool right after this.
        tracing::trace!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "session released"
        );
    }
}

impl<S> FromRequestParts<S> for Session
where
    DbPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = DbPool::from_ref(state);
        Session::acquire(&pool).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;

    fn unreachable_pool() -> DbPool {
        let config = Config::from_vars(
            [
                ("POSTGRES_PASSWORD", "unused"),
                ("JWT_SECRET_KEY", "unused"),
                ("POSTGRES_SERVER", "127.0.0.1"),
                ("POSTGRES_PORT", "1"),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap();

        db::create_lazy_pool(&config).unwrap()
    }

    #[tokio::test]
    async fn refused_connection_fails_fast_with_io_error() {
        let pool = unreachable_pool();

        let result = tokio::time::timeout(Duration::from_secs(5), Session::acquire(&pool))
            .await
            .expect("acquire should not wait for the pool timeout");

        match result {
            Err(AppError::Database(sqlx::Error::Io(_))) => {}
            other => panic!("expected connect error, got {other:?}"),
        }
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn refused_connection_maps_to_service_unavailable() {
        use axum::{http::StatusCode, response::IntoResponse};

        let err = Session::acquire(&unreachable_pool()).await.unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
