//! Platform webhook handler
//!
//! The single ingress for communication-platform lifecycle events. Signature
//! verification runs over the raw body bytes before any parsing; a payload
//! that parses but cannot be normalized is acked with 200 and dropped, so the
//! platform does not redeliver events this engine can never use.

use crate::dto::WebhookAck;
use crate::CallEngine;
use actix_web::{web, HttpRequest, HttpResponse};
use therapay_core::config::AppConfig;
use therapay_core::AppError;
use therapay_platform::{normalize_event, verify_signature, RawPlatformEvent};
use tracing::{debug, instrument, warn};

/// Receive one platform lifecycle event
///
/// POST /api/v1/webhooks/platform
#[instrument(skip_all)]
pub async fn receive_platform_event(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<AppConfig>,
    engine: web::Data<CallEngine>,
) -> Result<HttpResponse, AppError> {
    if config.platform.enforce_signatures {
        let signature = signature_header(&req).ok_or(AppError::MissingSignature)?;
        verify_signature(&config.platform.webhook_secret, &body, signature)?;
    } else {
        warn!("Webhook signature enforcement is disabled; accepting unsigned event");
    }

    let raw: RawPlatformEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting malformed webhook body: {}", e);
        AppError::MalformedPayload(e.to_string())
    })?;

    let event = match normalize_event(&raw) {
        Ok(event) => event,
        Err(e) => {
            // Ack so the platform does not retry an event we can never map
            warn!("Dropping {} event: {}", raw.event_type, e);
            return Ok(HttpResponse::Ok().json(WebhookAck::dropped(e.to_string())));
        }
    };

    debug!(
        call_cid = %event.call_cid,
        kind = event.kind_label(),
        "Webhook event normalized"
    );

    let outcome = match engine.handle_event(&event).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_retryable() => {
            // The 5xx response makes the platform redeliver the event;
            // idempotent transitions make that safe
            warn!(call_cid = %event.call_cid, "Transient failure, expecting redelivery: {}", e);
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    Ok(HttpResponse::Ok().json(WebhookAck::from_outcome(&outcome)))
}

/// Extract the webhook signature header
///
/// `X-Signature` is what the platform sends today; `X-Platform-Signature` is
/// accepted for older deliveries.
fn signature_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("X-Signature")
        .or_else(|| req.headers().get("X-Platform-Signature"))
        .and_then(|value| value.to_str().ok())
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhooks").route("/platform", web::post().to(receive_platform_event)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_signature_header_primary() {
        let req = TestRequest::post()
            .insert_header(("X-Signature", "abc123"))
            .to_http_request();
        assert_eq!(signature_header(&req), Some("abc123"));
    }

    #[test]
    fn test_signature_header_fallback() {
        let req = TestRequest::post()
            .insert_header(("X-Platform-Signature", "def456"))
            .to_http_request();
        assert_eq!(signature_header(&req), Some("def456"));
    }

    #[test]
    fn test_signature_header_missing() {
        let req = TestRequest::post().to_http_request();
        assert_eq!(signature_header(&req), None);
    }
}
