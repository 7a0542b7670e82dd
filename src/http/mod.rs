//! HTTP surface: health check, WebSocket upgrade, CORS and tracing layers

pub mod routes;

pub use routes::build_router;
