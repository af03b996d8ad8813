use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::responses::JsonResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendPayload {
    pub prompt: String,
    #[serde(default)]
    pub email: Option<String>,
}

// POST /api/pricing/recommend
pub async fn recommend(
    State(state): State<AppState>,
    Json(payload): Json<RecommendPayload>,
) -> Response {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return JsonResponse::bad_request("Prompt must not be empty").into_response();
    }
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let recommendation = state.pricing.recommend(prompt, email).await;
    Json(recommendation).into_response()
}
