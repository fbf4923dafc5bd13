//! `GET /models` — the configured model catalogue.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use chatrelay_core::config::ModelEntry;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.settings.models.clone(),
    })
}
