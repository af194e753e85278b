//! Request middleware.

pub mod mobile;

pub use mobile::mobile_view_middleware;
