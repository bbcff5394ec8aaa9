//! HTTP API over the orchestrator: task submission, status, review and
//! cancellation, plus the generated files under `/results`.

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod validation;

pub use models::*;
pub use server::*;
pub use state::*;
