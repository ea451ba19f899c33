use axum::extract::{Extension, Path, RawQuery, State};
use axum::Json;

use crate::error::AppError;
use crate::lnurl::{CallbackParams, CallbackResponse};
use crate::observability::correlation::RequestContext;
use crate::state::AppState;

/// `GET /lnurlp/callback/{token}?amount=<msat>[&comment=..][&nostr=..]`
#[axum_macros::debug_handler]
pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(token): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<CallbackResponse>, AppError> {
    let params = CallbackParams::from_query(query.as_deref());
    state
        .service
        .callback(&token, params, Some(&context))
        .await
        .map(Json)
        .map_err(|e| e.with_context(context))
}
