//! Mobile view proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mobile;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mobile::{MobileContext, MobileViewResolver, Mode};
