// OpenAPI authentication.
//
// v1.0 sends the bare token in `Authorization`. v1.1 adds an HMAC-SHA256
// signature over `token + t + nonce`, keyed with the account secret.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

pub const V1_0_BASE_URL: &str = "https://api.switch-bot.com/v1.0/";
pub const V1_1_BASE_URL: &str = "https://api.switch-bot.com/v1.1/";

/// Credential material for the cloud API.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// v1.0 bearer-style token.
    Token(SecretString),
    /// v1.1 token plus signing secret.
    Signed {
        token: SecretString,
        secret: SecretString,
    },
}

impl Credentials {
    /// Default API root matching the credential flavour.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Token(_) => V1_0_BASE_URL,
            Self::Signed { .. } => V1_1_BASE_URL,
        }
    }

    /// Build the per-request authentication headers.
    ///
    /// Signed credentials need a fresh nonce and timestamp on every request,
    /// so this is called for each send rather than baked into the client.
    pub fn headers(&self) -> Result<HeaderMap, Error> {
        match self {
            Self::Token(token) => token_headers(token),
            Self::Signed { token, secret } => {
                let t = chrono::Utc::now().timestamp_millis();
                let nonce = Uuid::new_v4().to_string();
                signed_headers(token, secret, t, &nonce)
            }
        }
    }
}

fn token_headers(token: &SecretString) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, sensitive(token.expose_secret())?);
    Ok(headers)
}

/// Compute the v1.1 header set for a given timestamp and nonce.
pub fn signed_headers(
    token: &SecretString,
    secret: &SecretString,
    t: i64,
    nonce: &str,
) -> Result<HeaderMap, Error> {
    let token = token.expose_secret();
    let payload = format!("{token}{t}{nonce}");

    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    let sign = BASE64.encode(mac.finalize().into_bytes());

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, sensitive(token)?);
    headers.insert(HeaderName::from_static("sign"), sensitive(&sign)?);
    headers.insert(HeaderName::from_static("nonce"), plain(nonce)?);
    headers.insert(HeaderName::from_static("t"), plain(&t.to_string())?);
    Ok(headers)
}

fn sensitive(value: &str) -> Result<HeaderValue, Error> {
    let mut v = plain(value)?;
    v.set_sensitive(true);
    Ok(v)
}

fn plain(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::Signing(format!("invalid header value: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let token: SecretString = "token".to_string().into();
        let secret: SecretString = "secret".to_string().into();

        let a = signed_headers(&token, &secret, 1_700_000_000_000, "nonce-1").unwrap();
        let b = signed_headers(&token, &secret, 1_700_000_000_000, "nonce-1").unwrap();
        assert_eq!(a.get("sign"), b.get("sign"));

        let c = signed_headers(&token, &secret, 1_700_000_000_000, "nonce-2").unwrap();
        assert_ne!(a.get("sign"), c.get("sign"));
    }

    #[test]
    fn signed_headers_carry_token_nonce_and_timestamp() {
        let token: SecretString = "abc".to_string().into();
        let secret: SecretString = "xyz".to_string().into();

        let h = signed_headers(&token, &secret, 42, "n").unwrap();
        assert_eq!(h.get(AUTHORIZATION).unwrap(), "abc");
        assert_eq!(h.get("nonce").unwrap(), "n");
        assert_eq!(h.get("t").unwrap(), "42");
        // 32-byte HMAC → 44 base64 chars
        assert_eq!(h.get("sign").unwrap().len(), 44);
    }

    #[test]
    fn token_credentials_only_set_authorization() {
        let creds = Credentials::Token("abc".to_string().into());
        let h = creds.headers().unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(creds.default_base_url(), V1_0_BASE_URL);
    }
}
