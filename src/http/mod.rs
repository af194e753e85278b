//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, limits)
//!     → middleware/mobile.rs (toggle, resolve mode, annotate request)
//!     → server.rs (forward to upstream)
//!     → response.rs (redirects, Vary, Link, X-Analytics, config blob)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, RequestTarget, X_MOBILE_MODE, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{AppState, HttpServer};
