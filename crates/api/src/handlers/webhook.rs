use actix_web::{web, HttpResponse};
use monobank_exporter_domain::WebhookEvent;
use tracing::{debug, warn};

use crate::state::AppState;

/// Bodies above this size are drained and dropped instead of parsed.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// The bank sends a GET to the URL before accepting it.
pub async fn webhook_check_handler() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Always answers 200 so the bank does not disable the webhook; unusable
/// bodies, oversized ones included, are logged and dropped.
pub async fn webhook_handler(state: web::Data<AppState>, payload: web::Payload) -> HttpResponse {
    let event = match payload.to_bytes_limited(MAX_WEBHOOK_BODY_BYTES).await {
        Ok(Ok(body)) => parse_event(&body),
        Ok(Err(err)) => {
            warn!(%err, "failed to read webhook body");
            None
        }
        Err(_) => {
            warn!(limit = MAX_WEBHOOK_BODY_BYTES, "webhook body too large");
            None
        }
    };
    let outcome = state.service().reconcile_webhook(event.as_ref());
    debug!(?outcome, "webhook processed");
    HttpResponse::Ok().finish()
}

fn parse_event(body: &[u8]) -> Option<WebhookEvent> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Option<WebhookEvent>>(body) {
        Ok(event) => event,
        Err(err) => {
            warn!(%err, "malformed webhook body");
            None
        }
    }
}
