//! Northbound API
//!
//! axum router exposing the traffic influence and PFD management resource
//! trees to AFs, the notification endpoint the core network posts to, and
//! a health check.
//! The same router is served by every listener the supervisor starts.

use crate::application::{EventRouter, PfdManagementService, RouteError, ServiceError, TrafficInfluenceService};
use crate::domain::entities::{PfdData, PfdManagement, ProblemDetails, TrafficInfluSub, TrafficInfluSubPatch};
use crate::domain::errors::RegistryError;
use crate::domain::events::NsmfEventExposureNotification;
use crate::domain::value_objects::NotificationKind;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Root of the traffic influence API.
pub const TRAFFIC_INFLUENCE_ROOT: &str = "/3gpp-traffic-influence/v1";

/// Root of the PFD management API.
pub const PFD_MANAGEMENT_ROOT: &str = "/3gpp-pfd-management/v1";

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub afs: usize,
}

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<TrafficInfluenceService>,
    pub pfd: Arc<PfdManagementService>,
    pub events: Arc<EventRouter>,
}

impl ApiState {
    pub fn new(
        service: Arc<TrafficInfluenceService>,
        pfd: Arc<PfdManagementService>,
        events: Arc<EventRouter>,
    ) -> Self {
        Self { service, pfd, events }
    }
}

/// Error rendered as problem details JSON.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    problem: ProblemDetails,
}

impl ApiError {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            status,
            problem: ProblemDetails::titled(title).with_status(status.as_u16()),
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.problem.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.problem)).into_response()
    }
}

/// Map a southbound status to the one shown to the AF.
///
/// A fixed set passes through, other client errors become 400 and
/// everything else 500.
pub fn northbound_status(status: u16) -> StatusCode {
    match status {
        400 | 404 | 411 | 415 | 500 | 503 => {
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        401..=499 => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let status = if e.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_REQUEST
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(e) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            ServiceError::Registry(e) => e.into(),
            ServiceError::Rejected {
                target,
                status,
                mut problem,
            } => {
                let mapped = northbound_status(status);
                tracing::warn!("{} answered {}, returning {}", target, status, mapped);
                problem.status = Some(mapped.as_u16());
                ApiError {
                    status: mapped,
                    problem,
                }
            }
            ServiceError::Southbound(e) => {
                tracing::error!("southbound failure: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "southbound request failed")
                    .with_detail(e.to_string())
            }
            e @ ServiceError::PfdNotProvisioned { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<RouteError> for ApiError {
    fn from(e: RouteError) -> Self {
        let status = match e {
            RouteError::NoMatch(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, e.to_string())
    }
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, "failed to parse request body").with_detail(e.to_string())
    })
}

/// Build the northbound router. `notification_path` is the prefix the
/// core network posts notifications under, e.g. `/3gpp-nef/v1/notification`.
pub fn build_router(state: ApiState, notification_path: &str) -> Router {
    let collection = format!("{}/:af_id/subscriptions", TRAFFIC_INFLUENCE_ROOT);
    let individual = format!("{}/:af_id/subscriptions/:subscription_id", TRAFFIC_INFLUENCE_ROOT);
    let notifications = format!("{}/:kind", notification_path.trim_end_matches('/'));

    Router::new()
        .route("/health", get(health_handler))
        .route(&collection, get(list_handler).post(create_handler))
        .route(
            &individual,
            get(get_handler)
                .put(replace_handler)
                .patch(patch_handler)
                .delete(delete_handler),
        )
        .route(&notifications, post(notify_handler))
        .merge(pfd_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn pfd_routes() -> Router<ApiState> {
    let transactions = format!("{}/:af_id/transactions", PFD_MANAGEMENT_ROOT);
    let transaction = format!("{}/:transaction_id", transactions);
    let application = format!("{}/applications/:app_id", transaction);

    Router::new()
        .route(&transactions, get(list_pfd_handler).post(create_pfd_handler))
        .route(
            &transaction,
            get(get_pfd_handler)
                .put(replace_pfd_handler)
                .delete(delete_pfd_handler),
        )
        .route(
            &application,
            get(get_pfd_app_handler)
                .put(replace_pfd_app_handler)
                .patch(patch_pfd_app_handler)
                .delete(delete_pfd_app_handler),
        )
}

/// Route for a UPF notification path outside `<notificationPath>/{kind}`.
pub fn upf_notification_router(state: ApiState, path: &str) -> Router {
    Router::new()
        .route(path, post(upf_notify_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        afs: state.service.registry().af_count(),
    };
    Json(response)
}

async fn list_handler(
    State(state): State<ApiState>,
    Path(af_id): Path<String>,
) -> Result<Json<Vec<TrafficInfluSub>>, ApiError> {
    let subscriptions = state.service.list(&af_id)?;
    Ok(Json(subscriptions.into_iter().map(|s| s.payload).collect()))
}

async fn create_handler(
    State(state): State<ApiState>,
    Path(af_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ti: TrafficInfluSub = parse_json(&body)?;
    let subscription = state.service.create(&af_id, ti).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, subscription.location.clone())],
        Json(subscription.payload),
    )
        .into_response())
}

async fn get_handler(
    State(state): State<ApiState>,
    Path((af_id, sub_id)): Path<(String, String)>,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let subscription = state.service.get(&af_id, &sub_id)?;
    Ok(Json(subscription.payload))
}

async fn replace_handler(
    State(state): State<ApiState>,
    Path((af_id, sub_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let ti: TrafficInfluSub = parse_json(&body)?;
    let subscription = state.service.replace(&af_id, &sub_id, ti).await?;
    Ok(Json(subscription.payload))
}

async fn patch_handler(
    State(state): State<ApiState>,
    Path((af_id, sub_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TrafficInfluSub>, ApiError> {
    let patch: TrafficInfluSubPatch = parse_json(&body)?;
    let subscription = state.service.patch(&af_id, &sub_id, patch).await?;
    Ok(Json(subscription.payload))
}

async fn delete_handler(
    State(state): State<ApiState>,
    Path((af_id, sub_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&af_id, &sub_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn notify_handler(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let kind = NotificationKind::from_path(&kind).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("unknown notification kind {}", kind))
    })?;
    route_notification(&state, kind, &body)
}

async fn upf_notify_handler(State(state): State<ApiState>, body: Bytes) -> Result<StatusCode, ApiError> {
    route_notification(&state, NotificationKind::UpPathChange, &body)
}

fn route_notification(state: &ApiState, kind: NotificationKind, body: &Bytes) -> Result<StatusCode, ApiError> {
    let notification: NsmfEventExposureNotification = parse_json(body)?;

    let routed = state.events.route(kind, notification)?;
    tracing::debug!(
        "notification for {}/{} accepted",
        routed.af_id,
        routed.subscription_id
    );
    Ok(StatusCode::OK)
}

// PFD management handlers

async fn list_pfd_handler(
    State(state): State<ApiState>,
    Path(af_id): Path<String>,
) -> Json<Vec<PfdManagement>> {
    let transactions = state.pfd.list(&af_id);
    Json(transactions.into_iter().map(|t| t.payload).collect())
}

async fn create_pfd_handler(
    State(state): State<ApiState>,
    Path(af_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let trans: PfdManagement = parse_json(&body)?;
    let transaction = match state.pfd.create(&af_id, trans).await {
        Ok(transaction) => transaction,
        Err(ServiceError::PfdNotProvisioned { reports }) => {
            tracing::warn!("no application of the PFD transaction for {} was accepted", af_id);
            return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(reports)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, transaction.location.clone())],
        Json(transaction.payload),
    )
        .into_response())
}

async fn get_pfd_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id)): Path<(String, String)>,
) -> Result<Json<PfdManagement>, ApiError> {
    let transaction = state.pfd.get(&af_id, &trans_id).await?;
    Ok(Json(transaction.payload))
}

async fn replace_pfd_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<PfdManagement>, ApiError> {
    let trans: PfdManagement = parse_json(&body)?;
    let transaction = state.pfd.replace(&af_id, &trans_id, trans).await?;
    Ok(Json(transaction.payload))
}

async fn delete_pfd_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.pfd.delete(&af_id, &trans_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_pfd_app_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id, app_id)): Path<(String, String, String)>,
) -> Result<Json<PfdData>, ApiError> {
    let app = state.pfd.get_application(&af_id, &trans_id, &app_id).await?;
    Ok(Json(app))
}

async fn replace_pfd_app_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id, app_id)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<PfdData>, ApiError> {
    let data: PfdData = parse_json(&body)?;
    let app = state
        .pfd
        .replace_application(&af_id, &trans_id, &app_id, data)
        .await?;
    Ok(Json(app))
}

async fn patch_pfd_app_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id, app_id)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<PfdData>, ApiError> {
    let patch: PfdData = parse_json(&body)?;
    let app = state
        .pfd
        .patch_application(&af_id, &trans_id, &app_id, patch)
        .await?;
    Ok(Json(app))
}

async fn delete_pfd_app_handler(
    State(state): State<ApiState>,
    Path((af_id, trans_id, app_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .pfd
        .delete_application(&af_id, &trans_id, &app_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
