// Hand-crafted async HTTP client for the SwitchBot OpenAPI.
//
// Base path: /v1.0/ or /v1.1/
// Auth: `Authorization` token, plus `sign`/`nonce`/`t` on v1.1

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::auth::Credentials;
use super::types::{ApiResponse, CommandRequest, DeviceList};
use crate::Error;
use crate::transport::TransportConfig;

/// Async client for the SwitchBot cloud API.
///
/// Cheap to clone; clones share the underlying connection pool. The
/// returned [`ApiResponse`] envelopes are not interpreted here: a vendor
/// `statusCode` other than 100 still comes back as `Ok`, because the
/// core classifies vendor codes itself.
#[derive(Clone)]
pub struct OpenApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl std::fmt::Debug for OpenApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OpenApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client against the default API root for the credential flavour.
    pub fn new(credentials: Credentials, transport: &TransportConfig) -> Result<Self, Error> {
        let base = credentials.default_base_url();
        Self::with_base_url(base, credentials, transport)
    }

    /// Build a client against an explicit API root (e.g. a test server).
    pub fn with_base_url(
        base_url: &str,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http, credentials)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Ensure the root ends with a slash so relative joins keep the version path.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET devices` — every physical device and IR remote on the account.
    pub async fn list_devices(&self) -> Result<DeviceList, Error> {
        let resp: ApiResponse = self.get("devices").await?;
        serde_json::from_value(resp.body.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: resp.body.to_string(),
        })
    }

    /// `GET devices/{id}/status`.
    pub async fn get_status(&self, device_id: &str) -> Result<ApiResponse, Error> {
        self.get(&format!("devices/{device_id}/status")).await
    }

    /// `POST devices/{id}/commands`.
    pub async fn send_command(
        &self,
        device_id: &str,
        command: &CommandRequest,
    ) -> Result<ApiResponse, Error> {
        self.post(&format!("devices/{device_id}/commands"), command)
            .await
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .headers(self.credentials.headers()?)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .headers(self.credentials.headers()?)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            });
        }

        Err(match status.as_u16() {
            code @ (401 | 403) => Error::Authentication {
                status: code,
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            },
            429 => Error::RateLimited,
            code => Error::Http { status: code, body },
        })
    }
}
