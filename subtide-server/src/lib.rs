//! Subtide Server - HTTP shell around the extraction engine
//!
//! Receives extraction work over HTTP, runs it on the core engine, and
//! reports completion by POSTing the run report to the caller's callback
//! URL. The shell stays thin: every decision about streams, artifacts, and
//! metadata lives in `subtide-core`.

pub mod handlers;
pub mod server;

pub use server::{AppState, run_server};
