pub mod health;
pub mod positions;
pub mod vaults;

use crate::db::EntityStore;
use crate::domain::Address;
use crate::error::AppError;
use axum::{routing::get, Router};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/vaults/:chain_id/:address", get(vaults::get_vault))
        .route(
            "/vaults/:chain_id/:address/positions",
            get(vaults::list_vault_positions),
        )
        .route(
            "/positions/:chain_id/:vault/:investor",
            get(positions::get_position),
        )
        .layer(cors)
        .with_state(state)
}

fn parse_address(raw: &str, field: &str) -> Result<Address, AppError> {
    Address::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} address", field)))
}
