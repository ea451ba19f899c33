//! HTTP surface: the two LNURL routes, the add-request API and the
//! operational endpoints.

use std::future::ready;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::basic_auth_middleware;
use crate::health::{health_check, liveness_check};
use crate::metrics::record_http_request;
use crate::observability::request_id_middleware;
use crate::state::AppState;

pub mod handlers;

use handlers::{api, lnurlp};

/// Build the application router.
///
/// Basic auth guards `/api/add_request` only; the LNURL routes are public.
/// `/metrics` is mounted when a Prometheus handle is given.
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let lnurl_router = Router::new()
        .route(
            "/.well-known/lnurlp/:username",
            get(lnurlp::pay_request::handle_rest),
        )
        .route(
            "/lnurlp/callback/:token",
            get(lnurlp::callback::handle_rest),
        );

    let auth = state.auth.clone();
    let event_bus = state.event_bus().clone();
    let api_router = Router::new()
        .route("/api/add_request", post(api::add_request::handle_rest))
        .route_layer(middleware::from_fn(move |request, next| {
            basic_auth_middleware(auth.clone(), event_bus.clone(), request, next)
        }));

    let mut router = Router::new()
        .merge(lnurl_router)
        .merge(api_router)
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check));

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || ready(handle.render())));
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    router
        .route_layer(middleware::from_fn(track_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };
    let method = req.method().clone();

    let response = next.run(req).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;
    use nostr_sdk::Event;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::BasicAuth;
    use crate::events::EventBus;
    use crate::invoice::HttpInvoiceService;
    use crate::lnurl::LnurlService;
    use crate::nostr::{derive_signing_keys, BroadcastReport, RelayPublisher, ZapReceiptPublisher};
    use crate::wallet::MemoryWallet;

    struct NullRelay;

    #[async_trait]
    impl RelayPublisher for NullRelay {
        async fn broadcast(
            &self,
            _relays: &[String],
            _event: &Event,
        ) -> anyhow::Result<BroadcastReport> {
            Ok(BroadcastReport::default())
        }
    }

    fn app() -> Router {
        let event_bus = Arc::new(EventBus::new(16));
        let xprv = Xpriv::new_master(Network::Bitcoin, &[1u8; 32])
            .unwrap()
            .to_string();
        let wallet =
            Arc::new(MemoryWallet::new("w1", xprv.clone(), 5000, event_bus.clone()).unwrap());
        let receipts = Arc::new(ZapReceiptPublisher::new(
            derive_signing_keys(&xprv).unwrap(),
            vec![],
            Arc::new(NullRelay),
        ));
        // never reached by these tests
        let invoices = Arc::new(
            HttpInvoiceService::new(
                "http://127.0.0.1:9/api/add_request",
                None,
                Duration::from_secs(1),
            )
            .unwrap(),
        );
        let service = Arc::new(LnurlService::new(
            "pay.example.com".to_string(),
            wallet,
            invoices,
            receipts,
            event_bus,
        ));
        build_router(
            AppState::new(service, BasicAuth::new(Some("secret".to_string()))),
            None,
        )
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_pay_request_route() {
        let response = app()
            .oneshot(
                Request::get("/.well-known/lnurlp/alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["maxSendable"], 5_000_000);
        assert_eq!(body["tag"], "payRequest");
    }

    #[tokio::test]
    async fn test_add_request_is_guarded() {
        let response = app()
            .oneshot(
                Request::post("/api/add_request")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app()
            .oneshot(
                Request::post("/api/add_request")
                    .header(header::AUTHORIZATION, BasicAuth::header_value("secret"))
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_callback_route_is_public() {
        let response = app()
            .oneshot(
                Request::get("/lnurlp/callback/unknown?amount=1000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ERROR");
        assert_eq!(
            body["reason"],
            "request not found, maybe expired, try again."
        );
    }

    #[tokio::test]
    async fn test_callback_repeated_keys_stay_lnurl_errors() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::get("/.well-known/lnurlp/alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let callback = json_body(response).await["callback"]
            .as_str()
            .unwrap()
            .to_string();
        let path = callback.trim_start_matches("https://pay.example.com");

        let response = app
            .oneshot(
                Request::get(format!("{path}?amount=500&amount=3000"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["reason"], "amount below minSendable.");
    }

    #[tokio::test]
    async fn test_metrics_route_only_with_handle() {
        let response = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
