use crate::state::AppState;
use axum::Router;

pub mod client;
pub mod handlers;
pub mod operations;
pub mod relay;
pub mod services;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::image_routes(state)
}
