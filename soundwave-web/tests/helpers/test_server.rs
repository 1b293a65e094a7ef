//! In-process test server
//!
//! Builds the same router as the binary, without binding a socket or
//! starting an audio source.

use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use soundwave_web::api::{build_router, AppContext};
use soundwave_web::config::{Config, SourceKind};
use soundwave_web::spectrum::BitDepth;
use soundwave_web::SharedState;

pub struct TestServer {
    router: Router,
    pub state: Arc<SharedState>,
    pub config: Arc<Config>,
}

impl TestServer {
    pub fn start() -> Self {
        let config = Config {
            source: SourceKind::Tone,
            bit_depth: BitDepth::Sixteen,
            send_timeout_ms: 50,
            ..Config::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let state = Arc::new(SharedState::new(Duration::from_millis(config.send_timeout_ms)));
        let config = Arc::new(config);
        let ctx = AppContext {
            state: Arc::clone(&state),
            config: Arc::clone(&config),
            bit_depth: config.bit_depth,
        };

        Self {
            router: build_router(ctx),
            state,
            config,
        }
    }

    /// Send one request and return the raw response
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> axum::response::Response {
        let mut request = Request::builder().method(method).uri(path);

        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Send one request and parse the JSON body (if any)
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Option<Value>) {
        let response = self.send(method, path, body).await;
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).unwrap())
        };

        (status, json)
    }
}
