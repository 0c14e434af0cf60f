use axum::extract::{Query, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::disk::{legacy_settings_path, write_legacy_settings};
use crate::error::APIError;
use crate::settings::{AdditionalConfig, SettingInput, SettingRecord};
use crate::utils::AppState;
use crate::validation::{success_message, validate_credential};

const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceQuery {
    service: Option<String>,
}

impl ServiceQuery {
    fn service(self) -> Option<String> {
        self.service.filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveSettingRequest {
    pub(crate) service_name: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) additional_config: Option<AdditionalConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct SaveSettingResponse {
    pub(crate) success: bool,
    pub(crate) data: SettingRecord,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct DeleteSettingResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateSettingRequest {
    pub(crate) service_name: Option<String>,
    pub(crate) api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ValidateSettingResponse {
    pub(crate) valid: bool,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceStatus {
    pub(crate) service_name: String,
    pub(crate) configured: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct DiagnosticsEnvironment {
    pub(crate) database_url_configured: bool,
    pub(crate) legacy_file_present: bool,
    pub(crate) backend: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct DiagnosticsResponse {
    pub(crate) message: String,
    pub(crate) environment: DiagnosticsEnvironment,
    pub(crate) timestamp: DateTime<Utc>,
}

pub(crate) fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let storage_routes = Router::new()
        .route(
            "/settings",
            get(get_settings)
                .post(save_setting)
                .delete(delete_setting)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/settings/status", get(settings_status).options(preflight))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_storage,
        ));

    Router::new()
        .merge(storage_routes)
        .route(
            "/settings/validate",
            post(validate_setting).options(preflight),
        )
        .route("/test", get(diagnostics).options(preflight))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Answers every storage-backed request with a 500 while the database is unreachable.
///
/// Only methods that reach storage are checked, so preflights and the 405
/// fallback answer the same way whether or not the database is up.
async fn require_storage(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, APIError> {
    if matches!(*request.method(), Method::GET | Method::POST | Method::DELETE) {
        state.store.health_check().await?;
    }
    Ok(next.run(request).await)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed(method: Method) -> APIError {
    APIError::MethodNotAllowed(method)
}

async fn mirror_legacy_file(state: &AppState) {
    if !state.mirror_legacy_file {
        return;
    }
    // held across list and write so snapshots land on disk in order
    let _guard = state.mirror_lock.lock().await;
    let path = legacy_settings_path(&state.storage_dir);
    let result = match state.store.list(&state.user_id).await {
        Ok(records) => {
            let target = path.clone();
            tokio::task::spawn_blocking(move || write_legacy_settings(&target, &records))
                .await
                .unwrap_or_else(|e| Err(APIError::Unexpected(e.to_string())))
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!("Failed to mirror settings to {}: {}", path.display(), e);
    }
}

pub(crate) async fn get_settings(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ServiceQuery>, APIError>,
) -> Result<Response, APIError> {
    match query.service() {
        Some(service) => {
            let record = state
                .store
                .get(&state.user_id, &service)
                .await?
                .ok_or(APIError::ServiceNotFound)?;
            Ok(Json(record).into_response())
        }
        None => {
            let records = state.store.list(&state.user_id).await?;
            Ok(Json(records).into_response())
        }
    }
}

pub(crate) async fn save_setting(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): WithRejection<Json<SaveSettingRequest>, APIError>,
) -> Result<Json<SaveSettingResponse>, APIError> {
    let input = SettingInput {
        service_name: payload.service_name.unwrap_or_default(),
        api_key: payload.api_key,
        additional_config: payload.additional_config,
    };
    input.validate()?;

    let record = state.store.upsert(&state.user_id, input).await?;
    mirror_legacy_file(&state).await;

    Ok(Json(SaveSettingResponse {
        success: true,
        data: record,
        message: "Settings saved successfully".to_string(),
    }))
}

pub(crate) async fn delete_setting(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ServiceQuery>, APIError>,
) -> Result<Json<DeleteSettingResponse>, APIError> {
    let service = query.service().ok_or(APIError::MissingServiceName)?;

    state.store.delete(&state.user_id, &service).await?;
    mirror_legacy_file(&state).await;

    Ok(Json(DeleteSettingResponse {
        success: true,
        message: "Settings deleted".to_string(),
    }))
}

pub(crate) async fn settings_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceStatus>>, APIError> {
    let statuses = state
        .store
        .list(&state.user_id)
        .await?
        .into_iter()
        .map(|record| ServiceStatus {
            configured: record.is_configured(),
            service_name: record.service_name,
        })
        .collect();
    Ok(Json(statuses))
}

pub(crate) async fn validate_setting(
    WithRejection(Json(payload), _): WithRejection<Json<ValidateSettingRequest>, APIError>,
) -> Result<(StatusCode, Json<ValidateSettingResponse>), APIError> {
    let service_name = payload
        .service_name
        .filter(|s| !s.is_empty())
        .ok_or(APIError::MissingServiceName)?;
    let api_key = payload.api_key.unwrap_or_default();

    let response = match validate_credential(&service_name, &api_key) {
        Ok(()) => (
            StatusCode::OK,
            Json(ValidateSettingResponse {
                valid: true,
                message: success_message(&service_name),
            }),
        ),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidateSettingResponse {
                valid: false,
                message: e.to_string(),
            }),
        ),
    };
    Ok(response)
}

pub(crate) async fn diagnostics(State(state): State<Arc<AppState>>) -> Json<DiagnosticsResponse> {
    Json(DiagnosticsResponse {
        message: "API is working".to_string(),
        environment: DiagnosticsEnvironment {
            database_url_configured: state.database_url_configured,
            legacy_file_present: legacy_settings_path(&state.storage_dir).exists(),
            backend: state.store.backend_name().to_string(),
        },
        timestamp: Utc::now(),
    })
}
