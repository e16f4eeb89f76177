// Chat-MVP - CSV-seeded multi-panel chat front-end with document export

pub mod chat;
pub mod config;
pub mod export;
pub mod files;
pub mod groups;
pub mod middleware;
pub mod models;
pub mod output;
pub mod routes;
pub mod session;
pub mod texts;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
