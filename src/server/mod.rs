//! Server module
//!
//! Contains the application server, routing, and shared state.

pub mod app;
pub mod routes;
pub mod state;

pub use app::App;
pub use state::AppState;
