//! HTTP surface for handle availability checks.

pub mod handles;
pub mod server;


pub use server::{build_router, start_server, ApiError, AppState};
