//! OpenAI-compatible HTTP API for the notes engine.
//!
//! Chat clients such as Open WebUI can point at this server and use
//! `self-notes` as a model. Every chat request is answered from the indexed
//! notes, with the sources appended to the reply.

pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use selfnotes_retrieval::NotesEngine;

pub use error::ApiError;
pub use router::{AppState, router};

/// Serve the API on `listener` until the process exits.
pub async fn serve(listener: TcpListener, engine: Arc<NotesEngine>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{addr}");
    }
    axum::serve(listener, router(AppState::new(engine))).await
}
