use std::time::Instant;

use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, ResponseError};
use futures_util::StreamExt;
use log::{error, info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::inference::ModelHost;
use crate::models::{HealthResponse, LabelsResponse, PredictionResponse};
use crate::preprocess::preprocess;

/// Multipart field the image is expected in.
pub const FILE_FIELD: &str = "file";

pub struct AppState {
    pub host: ModelHost,
    pub body_limit: usize,
}

/// Any origin, method and header; credentials allowed.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/labels").route(web::get().to(labels)))
        .service(web::resource("/health").route(web::get().to(health)));
}

pub async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();

    match run_prediction(state, payload, request_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!("[{request_id}] prediction failed: {err}");
            } else {
                warn!("[{request_id}] rejected upload: {err}");
            }
            Err(err)
        }
    }
}

async fn run_prediction(
    state: web::Data<AppState>,
    payload: Multipart,
    request_id: Uuid,
) -> ServiceResult<PredictionResponse> {
    let bytes = read_upload(payload, state.body_limit).await?;
    let size = bytes.len();
    let started = Instant::now();

    // Decoding and the forward pass are CPU bound; keep them off the async workers.
    let response = web::block(move || {
        let tensor = preprocess(&bytes)?;
        state.host.predict(tensor)
    })
    .await??;

    info!(
        "[{request_id}] {size} bytes -> {} ({:.3}) in {}ms",
        response.top_class,
        response.top_confidence,
        started.elapsed().as_millis()
    );

    Ok(response)
}

/// Buffers the `file` field in memory, refusing anything over `limit` bytes.
async fn read_upload(mut payload: Multipart, limit: usize) -> ServiceResult<Vec<u8>> {
    while let Some(item) = payload.next().await {
        let mut field = item?;

        if field.content_disposition().and_then(|cd| cd.get_name()) != Some(FILE_FIELD) {
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > limit {
                return Err(ServiceError::PayloadTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ServiceError::MissingFile);
        }
        return Ok(bytes);
    }

    Err(ServiceError::MissingFile)
}

pub async fn labels(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(LabelsResponse {
        labels: state.host.labels().as_slice(),
    })
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { status: "ok" })
}
