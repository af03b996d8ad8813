use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;

use crate::db::plan_change_repository::PlanChangeRepository;
use crate::models::plan_change::PlanChangeExportRow;
use crate::responses::JsonResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanChangeQuery {
    pub email: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// The ops surface is disabled entirely (every request refused) until
/// OPS_API_TOKEN is configured.
fn ops_token_matches(headers: &HeaderMap) -> bool {
    let expected = match std::env::var("OPS_API_TOKEN") {
        Ok(token) if !token.trim().is_empty() => token,
        _ => return false,
    };
    let provided = match headers.get("x-ops-token").and_then(|h| h.to_str().ok()) {
        Some(value) => value,
        None => return false,
    };
    subtle::ConstantTimeEq::ct_eq(expected.trim().as_bytes(), provided.as_bytes()).unwrap_u8()
        == 1u8
}

fn parse_bound(raw: Option<&str>) -> Result<Option<OffsetDateTime>, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => OffsetDateTime::parse(value, &Rfc3339)
            .map(Some)
            .map_err(|_| format!("Invalid rfc3339 timestamp: {value}")),
    }
}

// GET /api/admin/plan-changes
pub async fn list_plan_changes(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PlanChangeQuery>,
) -> Response {
    if !ops_token_matches(&headers) {
        return JsonResponse::forbidden("Ops token required").into_response();
    }

    let from = match parse_bound(query.from.as_deref()) {
        Ok(bound) => bound,
        Err(msg) => return JsonResponse::bad_request(&msg).into_response(),
    };
    let to = match parse_bound(query.to.as_deref()) {
        Ok(bound) => bound,
        Err(msg) => return JsonResponse::bad_request(&msg).into_response(),
    };
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    match app_state.ledger.search(email, from, to).await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            error!(?err, "failed to query plan changes");
            JsonResponse::server_error("Failed to query plan changes").into_response()
        }
    }
}

// GET /api/admin/plan-changes/export
//
// Same filters as the list, projected to the four columns the dashboard
// renders as CSV.
pub async fn export_plan_changes(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PlanChangeQuery>,
) -> Response {
    if !ops_token_matches(&headers) {
        return JsonResponse::forbidden("Ops token required").into_response();
    }

    let from = match parse_bound(query.from.as_deref()) {
        Ok(bound) => bound,
        Err(msg) => return JsonResponse::bad_request(&msg).into_response(),
    };
    let to = match parse_bound(query.to.as_deref()) {
        Ok(bound) => bound,
        Err(msg) => return JsonResponse::bad_request(&msg).into_response(),
    };
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    match app_state.ledger.search(email, from, to).await {
        Ok(entries) => {
            let rows: Vec<PlanChangeExportRow> =
                entries.iter().map(PlanChangeExportRow::from).collect();
            Json(rows).into_response()
        }
        Err(err) => {
            error!(?err, "failed to export plan changes");
            JsonResponse::server_error("Failed to export plan changes").into_response()
        }
    }
}
