//! HTTP edge handler for TicketBuddy.
//!
//! One axum router serves the dashboard API: tickets, incidents, the
//! diagnostic tool, the copilot, and the GitHub bridge including webhook
//! ingestion. Background work (auto-tickets, mirror polling) runs on detached
//! tokio tasks.
//!
//! ```ignore
//! use ticketbuddy_server::{router, AppState};
//!
//! let app = router(AppState::new(store));
//! ```

pub mod cors;
pub mod diagnostics;
pub mod error;
mod routes;
pub mod state;
pub mod sync;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
pub use sync::{resync_linked_repository, SyncReport};

/// Bind `addr` and serve until Ctrl-C.
///
/// With a non-zero `poll_interval` and a GitHub client the mirror poller runs
/// alongside the server.
pub async fn serve(state: AppState, addr: SocketAddr, poll_interval: Duration) -> std::io::Result<()> {
    let poller = match (&state.github, poll_interval.is_zero()) {
        (Some(github), false) => Some(sync::spawn_poller(
            state.store.clone(),
            github.clone(),
            poll_interval,
        )),
        (None, false) => {
            info!("Mirror polling configured but no GitHub token set, poller disabled");
            None
        }
        _ => None,
    };

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "TicketBuddy API listening");

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(poller) = poller {
        poller.abort();
    }
    if let Err(e) = &result {
        error!(error = %e, "Server error");
    }
    info!("Server stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
