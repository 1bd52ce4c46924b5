//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → middleware (first matching rule answers)
//!     → request.rs (match path, template data)
//!     → no match: server.rs forwards upstream or answers 404
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::static_response_middleware;
pub use server::HttpServer;
