use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::Json;
use tracing::info;

use crate::error::AppError;
use crate::invoice::{AddRequest, AddRequestResponse};
use crate::observability::correlation::RequestContext;
use crate::observability::sanitization::sanitize_invoice;
use crate::state::AppState;

/// The body is parsed by hand: any body that is not a valid add request is
/// answered with 415, whatever its content type.
fn parse_body(body: &[u8]) -> Result<AddRequest, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::malformed_request_body(format!("Invalid add request: {}", e)))
}

/// `POST /api/add_request`
#[axum_macros::debug_handler]
pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Result<Json<AddRequestResponse>, AppError> {
    let request = parse_body(&body).map_err(|e| e.with_context(context.clone()))?;

    let response = state
        .service
        .add_request(request)
        .await
        .map_err(|e| e.with_context(context))?;

    info!(
        payment_hash = %response.rhash,
        invoice = %sanitize_invoice(&response.invoice),
        "Add request served"
    );
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_parse_body_accepts_string_amount() {
        let request =
            parse_body(br#"{"amount_msats":"21000","comment":"c","metadata":"[]"}"#).unwrap();
        assert_eq!(request.amount_msats, 21000);
        assert_eq!(request.event_id, None);
    }

    #[test]
    fn test_parse_body_rejects_garbage() {
        for body in [&b"not json"[..], br#"{"comment":"c"}"#, b""] {
            let err = parse_body(body).unwrap_err();
            assert_eq!(err.category, ErrorCategory::MalformedRequestBody);
        }
    }
}
