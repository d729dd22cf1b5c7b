// src/core/peer.rs

//! The Peer Connector: opens and closes database sessions to cluster members,
//! probes reachability, and performs bounded reconnection.

use crate::core::errors::{RepguardError, Result};
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use tracing::debug;

/// A single dedicated database connection to a cluster member, owned
/// exclusively by whichever `NodeInfo` or monitor loop opened it.
#[derive(Debug)]
pub struct Session {
    conninfo: String,
    conn: PgConnection,
}

impl Session {
    fn new(conninfo: String, conn: PgConnection) -> Self {
        Self { conninfo, conn }
    }

    pub fn conninfo(&self) -> &str {
        &self.conninfo
    }

    pub(crate) fn connection_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Closes the underlying connection. Consumes `self` so it cannot be
    /// used again, and is always safe to call on every exit path.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            debug!("error closing session to {}: {}", self.conninfo, e);
        }
    }
}

/// A cheap reachability probe. Must not leave a session open: it opens its
/// own connection, runs a trivial round-trip, and closes it before returning.
pub async fn is_available(conninfo: &str) -> bool {
    match PgConnection::connect(conninfo).await {
        Ok(mut conn) => {
            let ok = sqlx::query("SELECT 1").execute(&mut conn).await.is_ok();
            let _ = conn.close().await;
            ok
        }
        Err(_) => false,
    }
}

/// Opens a session to `conninfo`. When `required` is true, the caller treats
/// failure as fatal (only used at daemon startup, never mid-monitoring).
pub async fn connect(conninfo: &str, required: bool) -> Result<Session> {
    match PgConnection::connect(conninfo).await {
        Ok(conn) => Ok(Session::new(conninfo.to_string(), conn)),
        Err(e) => {
            if required {
                Err(RepguardError::Database(std::sync::Arc::new(e)))
            } else {
                Err(RepguardError::PeerUnreachable(conninfo.to_string()))
            }
        }
    }
}


