#![allow(clippy::unwrap_used)]
// Integration tests for `OpenApiClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sbbridge_api::{CommandRequest, Credentials, Error, OpenApiClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(credentials: Credentials) -> (MockServer, OpenApiClient) {
    let server = MockServer::start().await;
    let base = format!("{}/v1.1", server.uri());
    let client = OpenApiClient::from_reqwest(&base, reqwest::Client::new(), credentials).unwrap();
    (server, client)
}

fn signed() -> Credentials {
    Credentials::Signed {
        token: "test-token".to_string().into(),
        secret: "test-secret".to_string().into(),
    }
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_get_status_sends_signed_headers() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/devices/C0FFEE000001/status"))
        .and(header("authorization", "test-token"))
        .and(header_exists("sign"))
        .and(header_exists("nonce"))
        .and(header_exists("t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statusCode": 100,
            "message": "success",
            "body": {
                "deviceId": "C0FFEE000001",
                "deviceType": "Smart Lock",
                "lockState": "locked",
                "doorState": "closed",
                "battery": 88
            }
        })))
        .mount(&server)
        .await;

    let resp = client.get_status("C0FFEE000001").await.unwrap();

    assert_eq!(resp.status_code, 100);
    assert_eq!(resp.body["lockState"], "locked");
    assert_eq!(resp.body["battery"], 88);
}

#[tokio::test]
async fn test_send_command_posts_request_body() {
    let (server, client) = setup(Credentials::Token("plain".to_string().into())).await;

    Mock::given(method("POST"))
        .and(path("/v1.1/devices/C0FFEE000001/commands"))
        .and(header("authorization", "plain"))
        .and(body_json(json!({
            "command": "unlock",
            "parameter": "default",
            "commandType": "command"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statusCode": 100,
            "message": "success",
            "body": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .send_command("C0FFEE000001", &CommandRequest::simple("unlock"))
        .await
        .unwrap();

    assert_eq!(resp.status_code, 100);
}

#[tokio::test]
async fn test_vendor_error_codes_are_returned_not_raised() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("POST"))
        .and(path("/v1.1/devices/C0FFEE000001/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statusCode": 161,
            "message": "device offline",
            "body": {}
        })))
        .mount(&server)
        .await;

    let resp = client
        .send_command("C0FFEE000001", &CommandRequest::simple("lock"))
        .await
        .unwrap();

    assert_eq!(resp.status_code, 161);
    assert_eq!(resp.message, "device offline");
}

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statusCode": 100,
            "message": "success",
            "body": {
                "deviceList": [
                    { "deviceId": "A1", "deviceName": "Front Door", "deviceType": "Smart Lock",
                      "enableCloudService": true, "hubDeviceId": "H1" }
                ],
                "infraredRemoteList": [
                    { "deviceId": "02-1", "deviceName": "Bedroom AC", "remoteType": "Air Conditioner",
                      "hubDeviceId": "H1" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let list = client.list_devices().await.unwrap();

    assert_eq!(list.device_list.len(), 1);
    assert_eq!(list.device_list[0].device_type.as_deref(), Some("Smart Lock"));
    assert_eq!(list.infrared_remote_list[0].remote_type, "Air Conditioner");
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/devices/X/status"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.get_status("X").await;

    assert!(
        matches!(result, Err(Error::Authentication { status: 401, .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_rate_limited() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/devices/X/status"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client.get_status("X").await.unwrap_err();

    assert!(matches!(err, Error::RateLimited));
    assert_eq!(err.http_status(), Some(429));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup(signed()).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/devices/X/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client.get_status("X").await;

    assert!(matches!(result, Err(Error::Deserialization { .. })));
}
