//! HTTP API
//!
//! Thin axum layer over the curriculum engine. Validation, authentication
//! and serialization frameworks live outside this service; handlers only
//! decode the request shapes, pass the acting user through, and map engine
//! errors to status codes.

pub mod handlers;
pub mod server;

pub use server::AppContext;
