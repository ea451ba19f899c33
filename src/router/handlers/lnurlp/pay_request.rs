use axum::extract::{Extension, Path, State};
use axum::Json;

use crate::error::AppError;
use crate::lnurl::PayRequestResponse;
use crate::observability::correlation::RequestContext;
use crate::state::AppState;

/// `GET /.well-known/lnurlp/{username}`
#[axum_macros::debug_handler]
pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(username): Path<String>,
) -> Result<Json<PayRequestResponse>, AppError> {
    state
        .service
        .pay_request(&username, Some(&context))
        .await
        .map(Json)
        .map_err(|e| e.with_context(context))
}
