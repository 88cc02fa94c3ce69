use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::convert::{ConvertError, Converter, ConverterConfig};
use crate::metric::{LineProtocolDecoder, Precision};

/// Application state shared across handlers
pub struct AppState {
    /// Options used when a request does not override them
    pub defaults: ConverterConfig,
    pub stats: WriteStats,
}

impl AppState {
    pub fn new(defaults: ConverterConfig) -> Self {
        Self {
            defaults,
            stats: WriteStats::default(),
        }
    }
}

/// Counters for the write endpoint
#[derive(Debug, Default)]
pub struct WriteStats {
    pub batches_accepted: AtomicU64,
    pub batches_rejected: AtomicU64,
    pub type_conflicts: AtomicU64,
    pub frames_emitted: AtomicU64,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Write
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    pub labels_column: Option<bool>,
    pub float_numbers: Option<bool>,
    /// Timestamp precision: ns, us, ms or s
    pub precision: Option<String>,
}

#[derive(Serialize)]
pub struct WriteResponse {
    pub frame_count: usize,
    pub frames: Vec<serde_json::Value>,
}

pub async fn write(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WriteParams>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let config = ConverterConfig {
        use_labels_column: params
            .labels_column
            .unwrap_or(state.defaults.use_labels_column),
        float_numbers: params.float_numbers.unwrap_or(state.defaults.float_numbers),
    };

    let precision = match params.precision.as_deref() {
        Some(p) => p
            .parse::<Precision>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => Precision::default(),
    };

    // Fresh decoder per request; nothing is shared between batches
    let converter = Converter::with_decoder(
        config,
        LineProtocolDecoder::new().with_precision(precision),
    );

    let frames = match converter.convert(&body) {
        Ok(frames) => frames,
        Err(e) => {
            state.stats.batches_rejected.fetch_add(1, Ordering::Relaxed);
            if e.is_fatal() {
                state.stats.type_conflicts.fetch_add(1, Ordering::Relaxed);
            }
            return Err(e.into());
        }
    };

    state.stats.batches_accepted.fetch_add(1, Ordering::Relaxed);
    state
        .stats
        .frames_emitted
        .fetch_add(frames.len() as u64, Ordering::Relaxed);

    Ok(Json(WriteResponse {
        frame_count: frames.len(),
        frames: frames.iter().map(|f| f.to_json()).collect(),
    }))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub batches_accepted: u64,
    pub batches_rejected: u64,
    pub type_conflicts: u64,
    pub frames_emitted: u64,
    pub defaults: ConverterConfig,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = &state.stats;
    Json(StatsResponse {
        batches_accepted: stats.batches_accepted.load(Ordering::Relaxed),
        batches_rejected: stats.batches_rejected.load(Ordering::Relaxed),
        type_conflicts: stats.type_conflicts.load(Ordering::Relaxed),
        frames_emitted: stats.frames_emitted.load(Ordering::Relaxed),
        defaults: state.defaults,
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Parse(_) | ConvertError::Conversion(_) => {
                tracing::warn!("Rejected batch: {}", err);
                ApiError::BadRequest(err.to_string())
            }
            ConvertError::TypeConflict { .. } => {
                tracing::error!("Aborted batch on type conflict: {}", err);
                ApiError::Unprocessable(err.to_string())
            }
            ConvertError::Frame(_) => {
                tracing::error!("Frame construction failed: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
