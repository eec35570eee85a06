use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use log::{error, info, warn};
use serde::Serialize;
use shared::DiagnosisResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::RelayError;
use crate::geotag::extract_coordinates;
use crate::relay::DiagnosisRelay;
use crate::upload::{UploadError, collect_images};

/// Body of every failed diagnosis; details stay in the server log.
pub const OPAQUE_ERROR: &str = "That's an error.";

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Relays by route segment, plus where uploads are spooled.
pub struct DiagnosisState {
    relays: HashMap<String, DiagnosisRelay>,
    upload_dir: PathBuf,
}

impl DiagnosisState {
    pub fn new(relays: HashMap<String, DiagnosisRelay>, upload_dir: PathBuf) -> Self {
        Self { relays, upload_dir }
    }
}

#[derive(Error, Debug)]
enum DiagnoseError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<PathBuf>) {
    cfg.service(web::resource("/api/diagnose/{backend}").route(web::post().to(handle_diagnose)));
    if let Some(static_dir) = static_dir {
        cfg.service(Files::new("/", static_dir).index_file("index.html"));
    }
}

async fn handle_diagnose(
    state: web::Data<DiagnosisState>,
    path: web::Path<String>,
    payload: Multipart,
) -> HttpResponse {
    let backend = path.into_inner();
    let Some(relay) = state.relays.get(&backend) else {
        warn!("No relay configured for backend {:?}", backend);
        return HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Unknown diagnosis backend: {}", backend),
        });
    };

    match diagnose(relay, payload, &state.upload_dir).await {
        Ok(results) => {
            info!("Diagnosed {} image(s) via {}", results.len(), backend);
            HttpResponse::Ok().json(results)
        }
        Err(e) => {
            error!("Diagnosis via {} failed: {}", backend, e);
            HttpResponse::BadRequest().json(OPAQUE_ERROR)
        }
    }
}

async fn diagnose(
    relay: &DiagnosisRelay,
    payload: Multipart,
    upload_dir: &Path,
) -> Result<Vec<DiagnosisResult>, DiagnoseError> {
    let mut images = collect_images(payload, upload_dir).await?;
    for image in &mut images {
        image.coordinates = extract_coordinates(&image.bytes);
    }
    Ok(relay.diagnose_batch(&images).await?)
}
