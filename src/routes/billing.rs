use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, response::Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, warn};

use crate::models::payment_event::PaymentWebhookEvent;
use crate::responses::JsonResponse;
use crate::services::billing::ProcessError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

fn signature_matches(secret: &str, body: &[u8], provided: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    let provided = provided.strip_prefix("v1=").unwrap_or(provided);
    subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), provided.as_bytes()).unwrap_u8() == 1u8
}

// POST /api/billing/webhook
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    // Verification is skipped entirely when no secret is configured.
    if let Ok(secret) = std::env::var("PAYMENT_WEBHOOK_SECRET") {
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            let provided = match headers
                .get("x-webhook-signature")
                .and_then(|h| h.to_str().ok())
            {
                Some(value) => value,
                None => {
                    return JsonResponse::unauthorized("Missing webhook signature").into_response()
                }
            };
            if !signature_matches(&secret, &body, provided) {
                warn!("payment webhook signature mismatch");
                return JsonResponse::unauthorized("Invalid webhook signature").into_response();
            }
        }
    }

    let event: PaymentWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(?err, "payment webhook body failed to parse");
            return JsonResponse::bad_request("Malformed webhook payload").into_response();
        }
    };

    match app_state.processor.process(&event).await {
        Ok(_) => Json(serde_json::json!({ "received": true })).into_response(),
        Err(ProcessError::Rejected(reason)) => {
            warn!(%reason, "payment webhook rejected");
            JsonResponse::bad_request(&reason).into_response()
        }
        Err(ProcessError::Ledger(err)) => {
            // Non-2xx tells the provider to redeliver.
            error!(?err, "payment webhook processing failed");
            JsonResponse::server_error("Failed to process payment event").into_response()
        }
    }
}
