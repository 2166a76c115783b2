//! Local HTTP API for the browser UI.
//!
//! Routes are nested under `/api/` behind a middleware stack:
//! CORS → Rate Limit → Audit → Handler.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ApiSession};
pub use types::ApiContext;
