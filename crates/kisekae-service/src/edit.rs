//! External image-edit service client.
//!
//! The edit service synthesizes pixels under a strict masking contract:
//! it receives the normalized person photo, garment reference art, a
//! strictly binary mask, and a free-text instruction, and returns one
//! image. Where it may edit is *not* its decision -- the guard stage
//! re-imposes the mask on whatever comes back.
//!
//! [`EditService`] is the seam: the orchestrator is generic over it, so
//! tests drive the state machine with stub services and no network.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use kisekae_pipeline::{RgbaImage, decode};

use crate::error::ServiceError;

/// Default edit instruction sent when the caller provides none.
pub const DEFAULT_INSTRUCTION: &str = "Only edit inside the masked region. Replace the garment \
     with the reference clothing. Do not change face, body, or background outside the mask. \
     Keep the clothing design, logo, and colors.";

/// Requested output sizing for the edit service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// Let the service pick; the guard's re-normalization absorbs
    /// whatever comes back.
    Auto,
    /// Request exact dimensions.
    Exact { width: u32, height: u32 },
}

impl OutputSize {
    /// Wire representation: `"auto"` or `"WxH"`.
    #[must_use]
    pub fn as_wire(&self) -> String {
        match *self {
            Self::Auto => "auto".to_owned(),
            Self::Exact { width, height } => format!("{width}x{height}"),
        }
    }
}

/// One edit request: already-encoded PNG payloads plus the instruction.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// Normalized person photo (canonical canvas size), PNG.
    pub person_png: Vec<u8>,
    /// Garment reference image(s), PNG.
    pub garment_pngs: Vec<Vec<u8>>,
    /// Strictly binary mask (canonical canvas size), PNG.
    pub mask_png: Vec<u8>,
    /// Free-text edit instruction.
    pub instruction: String,
    /// Requested output sizing.
    pub size: OutputSize,
}

/// The external edit service seam.
pub trait EditService {
    /// Submit an edit request and decode the returned image.
    ///
    /// Implementations map transport and remote failures into
    /// [`ServiceError`]; the orchestrator applies the timeout budget
    /// around this call.
    // Callers never require Send futures; the orchestrator awaits
    // in place.
    #[allow(async_fn_in_trait)]
    async fn edit(&self, request: &EditRequest) -> Result<RgbaImage, ServiceError>;
}

/// JSON body posted to the edit endpoint. Binary payloads travel as
/// standard base64.
#[derive(Serialize)]
struct WireRequest<'a> {
    person: String,
    garments: Vec<String>,
    mask: String,
    instruction: &'a str,
    size: String,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a EditRequest) -> Self {
        Self {
            person: STANDARD.encode(&request.person_png),
            garments: request
                .garment_pngs
                .iter()
                .map(|png| STANDARD.encode(png))
                .collect(),
            mask: STANDARD.encode(&request.mask_png),
            instruction: &request.instruction,
            size: request.size.as_wire(),
        }
    }
}

/// JSON body returned by the edit endpoint.
#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    image_b64: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of [`EditService`].
#[derive(Debug, Clone)]
pub struct HttpEditClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpEditClient {
    /// Create a client for the given endpoint URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl EditService for HttpEditClient {
    async fn edit(&self, request: &EditRequest) -> Result<RgbaImage, ServiceError> {
        let body = WireRequest::from_request(request);
        tracing::debug!(
            endpoint = %self.endpoint,
            garments = request.garment_pngs.len(),
            size = %body.size,
            "posting edit request",
        );

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
            .ok_or_else(|| ServiceError::Payload("response carried no image".to_owned()))?;
        let bytes = STANDARD
            .decode(b64)
            .map_err(|err| ServiceError::Payload(format!("invalid base64 image: {err}")))?;
        Ok(decode::decode_rgba(&bytes)?)
    }
}
