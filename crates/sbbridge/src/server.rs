//! Accessory and webhook HTTP endpoints.
//!
//! - `GET  /accessories`                                  every accessory
//! - `GET  /accessories/:id`                              one accessory
//! - `PUT  /accessories/:id/characteristics/:name`        characteristic write
//! - `POST /webhook`                                      cloud change reports

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sbbridge_core::{CoreError, Delivery, FieldValue, WebhookRouter};

use crate::accessory::{AccessoryView, Bridge};

#[derive(Debug, Clone)]
pub struct AppState {
    pub bridge: Bridge,
    pub webhook: WebhookRouter,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/accessories", get(list_accessories))
        .route("/accessories/:id", get(get_accessory))
        .route(
            "/accessories/:id/characteristics/:name",
            put(write_characteristic),
        )
        .route("/webhook", post(receive_webhook))
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "accessory server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn no_such_accessory(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("no accessory '{id}'"))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match err {
            CoreError::UnknownCharacteristic { .. } => StatusCode::NOT_FOUND,
            CoreError::ReadOnly { .. } => StatusCode::FORBIDDEN,
            CoreError::InvalidValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::InvalidWebhook { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_accessories(State(state): State<AppState>) -> Json<Vec<AccessoryView>> {
    Json(state.bridge.iter().map(|d| d.view()).collect())
}

async fn get_accessory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccessoryView>, ApiError> {
    state
        .bridge
        .get(&id)
        .map(|d| Json(d.view()))
        .ok_or_else(|| ApiError::no_such_accessory(&id))
}

async fn write_characteristic(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let device = state
        .bridge
        .get(&id)
        .ok_or_else(|| ApiError::no_such_accessory(&id))?;

    // Accept either a bare value or `{"value": ...}`.
    let raw = match body {
        Value::Object(mut map) if map.contains_key("value") => {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    };
    let value: FieldValue = serde_json::from_value(raw).map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("expected a boolean, number or string: {e}"),
        )
    })?;

    debug!(device = %id, characteristic = %name, ?value, "characteristic write");
    device.engine.projector().on_write(&name, value)?;
    Ok(StatusCode::ACCEPTED)
}

async fn receive_webhook(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let delivery = state.webhook.dispatch(&body)?;
    let status = match delivery {
        Delivery::Delivered => "delivered",
        Delivery::Unrouted => "unrouted",
        Delivery::Dropped => "dropped",
    };
    Ok(Json(json!({ "status": status })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use sbbridge_core::{DeviceConfig, DeviceKind, Transports};

    use super::*;

    struct TestServer {
        base: String,
        bridge: Bridge,
        webhook: WebhookRouter,
        cancel: CancellationToken,
    }

    async fn spawn() -> TestServer {
        let webhook = WebhookRouter::new();
        let devices = vec![
            DeviceConfig::new("C0FFEE000001", "Front Door", DeviceKind::Lock),
            DeviceConfig::new("C0FFEE000002", "Hall", DeviceKind::Motion),
        ];
        let transports = Transports {
            webhook: Some(webhook.clone()),
            ..Transports::default()
        };
        let bridge = Bridge::build(devices, &transports).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        let state = AppState {
            bridge: bridge.clone(),
            webhook: webhook.clone(),
        };
        tokio::spawn(serve(listener, state, cancel.clone()));

        TestServer {
            base,
            bridge,
            webhook,
            cancel,
        }
    }

    #[tokio::test]
    async fn lists_accessories() {
        let server = spawn().await;
        let body: Value = reqwest::get(format!("{}/accessories", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["C0FFEE000001", "C0FFEE000002"]);
        assert_eq!(body[0]["kind"], "lock");
        server.cancel.cancel();
    }

    #[tokio::test]
    async fn unknown_accessory_is_404() {
        let server = spawn().await;
        let resp = reqwest::get(format!("{}/accessories/nope", server.base))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        server.cancel.cancel();
    }

    #[tokio::test]
    async fn writes_are_queued() {
        let server = spawn().await;
        let client = reqwest::Client::new();
        let url = format!(
            "{}/accessories/C0FFEE000001/characteristics/LockTargetState",
            server.base
        );

        let resp = client.put(&url).json(&json!({ "value": 0 })).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
        assert!(server.bridge.get("C0FFEE000001").unwrap().engine.has_pending());
        server.cancel.cancel();
    }

    #[tokio::test]
    async fn rejected_writes_map_to_statuses() {
        let server = spawn().await;
        let client = reqwest::Client::new();
        let put = |path: &str| client.put(format!("{}/accessories/{path}", server.base));

        let resp = put("C0FFEE000001/characteristics/Volume")
            .json(&json!(1))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        let resp = put("C0FFEE000002/characteristics/MotionDetected")
            .json(&json!(true))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

        let resp = put("C0FFEE000001/characteristics/LockTargetState")
            .json(&json!([1, 2]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        server.cancel.cancel();
    }

    #[tokio::test]
    async fn webhook_routes_by_mac() {
        let server = spawn().await;
        let mut rx = server.webhook.register("C0FFEE000001", None);
        let client = reqwest::Client::new();
        let url = format!("{}/webhook", server.base);

        let body: Value = client
            .post(&url)
            .json(&json!({
                "eventType": "changeReport",
                "context": { "deviceMac": "C0FFEE000001", "lockState": "LOCKED" }
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "delivered");
        assert_eq!(rx.recv().await.unwrap()["lockState"], "LOCKED");

        let resp = client
            .post(&url)
            .json(&json!({ "eventType": "changeReport" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        server.cancel.cancel();
    }
}
