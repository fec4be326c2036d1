//! HTTP surface of the subscription server.

use crate::error::{ServerError, ServerResult};
use crate::handler::parse_cursor;
use crate::server::{Subscription, SubscriptionServer};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Path of the label subscription endpoint.
pub const SUBSCRIBE_LABELS_PATH: &str = "/xrpc/com.atproto.label.subscribeLabels";

/// Builds the router for `server`.
pub fn router(server: Arc<SubscriptionServer>) -> Router {
    Router::new()
        .route(SUBSCRIBE_LABELS_PATH, get(subscribe_labels_handler))
        .route("/health", get(health_handler))
        .with_state(server)
}

/// Serves a [`SubscriptionServer`] over HTTP.
pub struct HttpServer {
    server: Arc<SubscriptionServer>,
}

impl HttpServer {
    /// Wraps a subscription server.
    pub fn new(server: SubscriptionServer) -> Self {
        Self {
            server: Arc::new(server),
        }
    }

    /// Returns the router.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.server))
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Binds the configured address and serves until `shutdown` completes.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.server.config().bind_addr).await?;
        info!("label server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn subscribe_labels_handler(
    State(server): State<Arc<SubscriptionServer>>,
    Query(params): Query<HashMap<String, String>>,
) -> ServerResult<Response> {
    open_subscription(&server, params.get("cursor").map(String::as_str))
}

fn open_subscription(server: &SubscriptionServer, raw_cursor: Option<&str>) -> ServerResult<Response> {
    let cursor = parse_cursor(raw_cursor)?;
    match server.subscribe(cursor)? {
        Subscription::Rejected(frame) => Ok((
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "application/cbor")],
            frame.encode()?,
        )
            .into_response()),
        Subscription::Streaming(stream) => {
            let frames = stream.into_encoded().inspect(|frame| {
                if let Err(e) = frame {
                    error!(error = ?e, "label stream closed");
                }
            });
            Ok((
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(frames),
            )
                .into_response())
        }
    }
}

fn text_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            text_response(StatusCode::BAD_REQUEST, self.to_string())
        } else {
            error!(error = ?self, "subscribeLabels failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::label_log::{LabelLog, MemoryLabelLog};
    use arachne_protocol::{ErrorFrame, Label, LabelsFrame};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(entries: u64, lookback: u64) -> (Router, Arc<MemoryLabelLog>) {
        let log = Arc::new(MemoryLabelLog::new());
        for n in 0..entries {
            log.append(
                "k",
                Label::new("did:plc:a", format!("at://did:plc:a/app.bsky.feed.post/{n}"), None, "No", "now"),
            )
            .unwrap();
        }
        let server = SubscriptionServer::new(
            ServerConfig::default().with_max_allowed_lookback(lookback),
            log.clone(),
        );
        (router(Arc::new(server)), log)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_on_the_configured_address() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let log: Arc<dyn LabelLog> = Arc::new(MemoryLabelLog::new());

        let busy = HttpServer::new(SubscriptionServer::new(ServerConfig::new(addr), log.clone()));
        assert!(busy.serve_with_shutdown(async {}).await.is_err());

        drop(taken);
        let free = HttpServer::new(SubscriptionServer::new(ServerConfig::new(addr), log));
        free.serve_with_shutdown(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (router, _) = app(0, 0);
        let response = router.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn non_numeric_cursor_is_plain_400() {
        let (router, _) = app(10, 0);
        let response = router
            .oneshot(get_request(&format!("{SUBSCRIBE_LABELS_PATH}?cursor=abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Invalid cursor 'abc'");
    }

    #[tokio::test]
    async fn out_of_range_integer_cursors_are_accepted() {
        for cursor in ["-99999999999999999999", "99999999999999999999"] {
            let (router, _) = app(10, 10);
            let response = router
                .oneshot(get_request(&format!("{SUBSCRIBE_LABELS_PATH}?cursor={cursor}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "cursor {cursor}");
        }
    }

    #[tokio::test]
    async fn outdated_cursor_is_cbor_400() {
        let (router, _) = app(1000, 200);
        let response = router
            .oneshot(get_request(&format!("{SUBSCRIBE_LABELS_PATH}?cursor=750")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/cbor");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let frame = ErrorFrame::decode(&body).unwrap();
        assert_eq!(frame, ErrorFrame::outdated_cursor(750, 200, 1000));
    }

    #[tokio::test]
    async fn accepted_cursor_streams_frames() {
        let (router, _) = app(1000, 200);
        let response = router
            .oneshot(get_request(&format!("{SUBSCRIBE_LABELS_PATH}?cursor=850")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(LabelsFrame::decode(&chunk).unwrap().seq, 850);
    }

    #[tokio::test]
    async fn negative_cursor_is_clamped() {
        let (router, _) = app(5, 10);
        let response = router
            .oneshot(get_request(&format!("{SUBSCRIBE_LABELS_PATH}?cursor=-3")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        assert_eq!(LabelsFrame::decode(&chunk).unwrap().seq, 0);
    }

    #[tokio::test]
    async fn tail_subscription_waits_for_appends() {
        let (router, log) = app(3, 0);
        let response = router
            .oneshot(get_request(SUBSCRIBE_LABELS_PATH))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        log.append("k", Label::new("did:plc:a", "at://x", None, "Yes", "now"))
            .unwrap();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = LabelsFrame::decode(&chunk).unwrap();
        assert_eq!(frame.seq, 3);
        assert_eq!(frame.labels[0].val, "Yes");
    }

    #[test]
    fn server_errors_map_to_status() {
        let response = ServerError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = ServerError::InvalidCursor("x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
