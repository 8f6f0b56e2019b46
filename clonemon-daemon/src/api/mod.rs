//! HTTP API for clonemond.

mod server;

pub use server::{router, serve, AppState};
