//! Request middleware.

pub mod static_response;

pub use static_response::static_response_middleware;
