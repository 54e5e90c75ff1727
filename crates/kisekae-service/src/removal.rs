//! Background-removal service client.
//!
//! Contract: an image goes in, an image with a populated alpha channel
//! (subject isolated) comes out. The result feeds the alpha-derived
//! mask mode and garment cutout preparation; this client never decides
//! anything about masking itself.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use kisekae_pipeline::{RgbaImage, decode};

use crate::error::ServiceError;

/// The background-removal service seam.
pub trait RemovalService {
    /// Submit an image and decode the returned cutout.
    // Callers never require Send futures; the orchestrator awaits
    // in place.
    #[allow(async_fn_in_trait)]
    async fn remove_background(&self, image_png: &[u8]) -> Result<RgbaImage, ServiceError>;
}

#[derive(Serialize)]
struct WireRequest {
    image: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    image_b64: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of [`RemovalService`].
#[derive(Debug, Clone)]
pub struct HttpRemovalClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpRemovalClient {
    /// Create a client for the given endpoint URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl RemovalService for HttpRemovalClient {
    async fn remove_background(&self, image_png: &[u8]) -> Result<RgbaImage, ServiceError> {
        tracing::debug!(endpoint = %self.endpoint, bytes = image_png.len(), "posting removal request");
        let body = WireRequest {
            image: STANDARD.encode(image_png),
        };

        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let wire: WireResponse = response.json().await?;
        if let Some(message) = wire.error {
            return Err(ServiceError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        let b64 = wire
            .image_b64
            .ok_or_else(|| ServiceError::Payload("response carried no cutout".to_owned()))?;
        let bytes = STANDARD
            .decode(b64)
            .map_err(|err| ServiceError::Payload(format!("invalid base64 cutout: {err}")))?;
        Ok(decode::decode_rgba(&bytes)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_request_carries_base64_image() {
        let body = WireRequest {
            image: STANDARD.encode([9, 8, 7]),
        };
        let json = serde_json::to_value(&body).unwrap();
        let field = json.get("image").and_then(|v| v.as_str()).unwrap();
        assert_eq!(STANDARD.decode(field).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn wire_response_error_variant_parses() {
        let wire: WireResponse = serde_json::from_str(r#"{"error":"no subject"}"#).unwrap();
        assert_eq!(wire.error.as_deref(), Some("no subject"));
        assert!(wire.image_b64.is_none());
    }
}
