//! HTTP interface
//!
//! Thin JSON transport over the detector. One shared detector behind a
//! mutex serves every request; each handler locks it around a complete
//! operation (append plus detect, reset, or status), so concurrent clients
//! interleave whole operations and never see a half-updated window.
//!
//! # Endpoints
//!
//! - `POST /detect-bpm` - feed one chunk, get the current tempo reading
//! - `GET /health` - readiness probe
//! - `POST /reset` - clear detector state
//! - `GET /status` - detector introspection
//!
//! Audio arrives as base64-encoded little-endian 32-bit float samples.
//! Numbers in responses are rounded at this boundary only; the detector
//! itself works at full precision.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Response as HttpResponse, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::buffer::AudioChunk;
use crate::config::{DetectorConfig, Smoothing};
use crate::detector::{Detection, Detector};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    detector: Arc<Mutex<Detector>>,
}

impl AppState {
    /// State with a default-configured detector
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    /// State with an explicit starting configuration
    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            detector: Arc::new(Mutex::new(Detector::new(config))),
        }
    }

    /// Lock the shared detector.
    ///
    /// A panicking handler cannot leave the detector mid-mutation (state
    /// updates happen only after estimation succeeds), so a poisoned lock
    /// is safe to reclaim.
    fn lock(&self) -> MutexGuard<'_, Detector> {
        self.detector.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detect-bpm", post(detect_bpm))
        .route("/reset", post(reset))
        .route("/status", get(status))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    #[serde(default)]
    audio: Option<String>,

    #[serde(default = "default_sample_rate", rename = "sampleRate")]
    sample_rate: u32,

    #[serde(default = "default_min_bpm", rename = "minBPM")]
    min_bpm: f32,

    #[serde(default = "default_max_bpm", rename = "maxBPM")]
    max_bpm: f32,

    #[serde(default)]
    smoothing: Smoothing,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_min_bpm() -> f32 {
    40.0
}

fn default_max_bpm() -> f32 {
    200.0
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    bpm: f32,
    confidence: f32,
    stable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    methods: Option<MethodsPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_duration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct MethodsPayload {
    onset: f32,
    tempogram: f32,
    autocorr: f32,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    version: &'static str,
    ready: bool,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        backend: "rustfft",
        version: env!("CARGO_PKG_VERSION"),
        ready: true,
    })
}

async fn detect_bpm(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return bad_request("No data provided".to_string());
    }

    let request: DetectRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            log::info!("Rejected detect-bpm request: {}", error);
            return bad_request(format!("Invalid JSON: {}", error));
        }
    };

    let encoded = match &request.audio {
        Some(audio) if !audio.is_empty() => audio,
        _ => return bad_request("No audio data provided".to_string()),
    };
    let samples = match decode_samples(encoded) {
        Ok(samples) => samples,
        Err(message) => return bad_request(message),
    };
    if samples.is_empty() {
        return bad_request("Empty audio data".to_string());
    }

    let chunk = match AudioChunk::new(samples, request.sample_rate) {
        Ok(chunk) => chunk,
        Err(error) => return bad_request(error.to_string()),
    };
    let config = DetectorConfig {
        min_bpm: request.min_bpm,
        max_bpm: request.max_bpm,
        smoothing: request.smoothing,
    };

    let detection = {
        let mut detector = state.lock();
        detector.set_config(config);
        detector.detect(chunk)
    };

    let response = match detection {
        Detection::Collecting { bpm } => {
            log::info!("Collecting audio, reporting {:.1} BPM", bpm);
            DetectResponse {
                bpm: round1(bpm),
                confidence: 0.0,
                stable: false,
                methods: None,
                audio_duration: None,
                status: Some("collecting_audio"),
                error: None,
            }
        }
        Detection::Estimated(reading) => {
            log::info!(
                "Detected {:.1} BPM (confidence {:.0}, stable: {})",
                reading.bpm,
                reading.confidence,
                reading.stable
            );
            DetectResponse {
                bpm: round1(reading.bpm),
                confidence: reading.confidence.round(),
                stable: reading.stable,
                methods: Some(MethodsPayload {
                    onset: round1(reading.methods.onset),
                    tempogram: round1(reading.methods.tempogram),
                    autocorr: round1(reading.methods.autocorr),
                }),
                audio_duration: Some(round1(reading.audio_duration)),
                status: None,
                error: None,
            }
        }
        Detection::Failed { bpm, message } => {
            log::warn!("Estimation fault reported to client: {}", message);
            DetectResponse {
                bpm: round1(bpm),
                confidence: 0.0,
                stable: false,
                methods: None,
                audio_duration: None,
                status: None,
                error: Some(message),
            }
        }
    };
    Json(response).into_response()
}

async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.lock().reset();
    log::info!("Detector state reset");
    Json(ResetResponse {
        status: "reset",
        message: "BPM detector history cleared",
    })
}

async fn status(State(state): State<AppState>) -> Response {
    let snapshot = state.lock().status();
    Json(snapshot).into_response()
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Endpoint not found".to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response()
}

/// Decode base64 little-endian f32 samples
fn decode_samples(encoded: &str) -> Result<Vec<f32>, String> {
    let bytes = match BASE64.decode(encoded) {
        Ok(bytes) => bytes,
        Err(error) => {
            log::info!("Rejected audio payload: {}", error);
            return Err("Invalid audio encoding".to_string());
        }
    };
    if bytes.len() % 4 != 0 {
        return Err("Invalid audio encoding".to_string());
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Round to one decimal place at the serialization boundary
fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Panic fallback: a fixed JSON 500 regardless of what the panic carried
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> HttpResponse<Full<Bytes>> {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };
    log::error!("Handler panicked: {}", detail);

    let mut response = HttpResponse::new(Full::new(Bytes::from_static(
        br#"{"error":"Internal server error"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
