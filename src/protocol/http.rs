//! Warp HTTP adapter for the agent gateway.
//!
//! Routes stay thin: extract the bearer token and body, call the gateway,
//! and map protocol errors to status codes through a custom rejection.

use super::dto::{CompleteJobRequest, HeartbeatRequest, ProvisionCallbackRequest};
use super::service::{AgentGateway, ProtocolError};
use crate::firewall::ports::FirewallRuleRepository;
use crate::job::domain::JobId;
use crate::job::ports::JobRepository;
use crate::server::ports::{
    MetricsRecorder, ProvisioningStepRepository, ServerRepository, ServiceRepository,
};
use mockable::Clock;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Rejection carrying the status and message for an API error.
#[derive(Debug)]
struct ApiReject {
    status: StatusCode,
    message: String,
}

impl warp::reject::Reject for ApiReject {}

/// JSON error body returned for every rejected request.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn reject(err: ProtocolError) -> Rejection {
    let status = match &err {
        ProtocolError::Unauthorized => StatusCode::UNAUTHORIZED,
        ProtocolError::JobNotOwned(_) | ProtocolError::UnknownToken => StatusCode::NOT_FOUND,
        ProtocolError::CompletionConflict(_) => StatusCode::CONFLICT,
        ProtocolError::InvalidCompletionStatus(_) => StatusCode::BAD_REQUEST,
        ProtocolError::Registration(_)
        | ProtocolError::Reconcile(_)
        | ProtocolError::Queue(_)
        | ProtocolError::Firewall(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "agent request failed");
    }
    warp::reject::custom(ApiReject {
        status,
        message: err.to_string(),
    })
}

/// Maps rejections to JSON error responses.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_owned())
    } else if let Some(api) = err.find::<ApiReject>() {
        (api.status, api.message.clone())
    } else if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, body.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_owned(),
        )
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_owned(),
        )
    };
    let body = warp::reply::json(&ErrorBody { error: message });
    Ok(warp::reply::with_status(body, status))
}

/// Extracts the bearer token from the `Authorization` header; requests
/// without one carry an empty token and fail authentication downstream.
fn bearer_token() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(|header: Option<String>| {
        header
            .as_deref()
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_owned()
    })
}

fn with_gateway<S, P, V, J, C, M, F>(
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> impl Filter<Extract = (Arc<AgentGateway<S, P, V, J, C, M, F>>,), Error = Infallible> + Clone
where
    S: ServerRepository + 'static,
    P: ProvisioningStepRepository + 'static,
    V: ServiceRepository + 'static,
    J: JobRepository + 'static,
    C: Clock + Send + Sync + 'static,
    M: MetricsRecorder + 'static,
    F: FirewallRuleRepository + 'static,
{
    warp::any().map(move || Arc::clone(&gateway))
}

/// Builds the full agent-facing route tree.
pub fn routes<S, P, V, J, C, M, F>(
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone
where
    S: ServerRepository + 'static,
    P: ProvisioningStepRepository + 'static,
    V: ServiceRepository + 'static,
    J: JobRepository + 'static,
    C: Clock + Send + Sync + 'static,
    M: MetricsRecorder + 'static,
    F: FirewallRuleRepository + 'static,
{
    let heartbeat = warp::path!("heartbeat")
        .and(warp::post())
        .and(bearer_token())
        .and(warp::body::json())
        .and(with_gateway(Arc::clone(&gateway)))
        .and_then(handle_heartbeat);

    let fetch_jobs = warp::path!("jobs")
        .and(warp::get())
        .and(bearer_token())
        .and(with_gateway(Arc::clone(&gateway)))
        .and_then(handle_fetch_jobs);

    let complete_job = warp::path!("jobs" / Uuid / "complete")
        .and(warp::post())
        .and(bearer_token())
        .and(warp::body::json())
        .and(with_gateway(Arc::clone(&gateway)))
        .and_then(handle_complete_job);

    let provision_callback = warp::path!("provision" / "callback" / String)
        .and(warp::get())
        .and(warp::body::bytes())
        .and(with_gateway(Arc::clone(&gateway)))
        .and_then(handle_provision_callback);

    let confirm_firewall = warp::path!("firewall" / "confirm" / String)
        .and(warp::get())
        .and(with_gateway(gateway))
        .and_then(handle_confirm_firewall);

    heartbeat
        .or(fetch_jobs)
        .or(complete_job)
        .or(provision_callback)
        .or(confirm_firewall)
        .recover(handle_rejection)
}

async fn handle_heartbeat<S, P, V, J, C, M, F>(
    bearer: String,
    request: HeartbeatRequest,
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> Result<impl Reply, Rejection>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    let response = gateway.heartbeat(&bearer, request).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn handle_fetch_jobs<S, P, V, J, C, M, F>(
    bearer: String,
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> Result<impl Reply, Rejection>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    let response = gateway.fetch_jobs(&bearer).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn handle_complete_job<S, P, V, J, C, M, F>(
    job_id: Uuid,
    bearer: String,
    request: CompleteJobRequest,
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> Result<impl Reply, Rejection>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    let response = gateway
        .complete_job(&bearer, JobId::from_uuid(job_id), request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn handle_provision_callback<S, P, V, J, C, M, F>(
    token: String,
    body: warp::hyper::body::Bytes,
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> Result<impl Reply, Rejection>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    // Installer callbacks may omit the body entirely.
    let request: ProvisionCallbackRequest = if body.is_empty() {
        ProvisionCallbackRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| {
            warp::reject::custom(ApiReject {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            })
        })?
    };
    let response = gateway
        .provision_callback(&token, request)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&response))
}

async fn handle_confirm_firewall<S, P, V, J, C, M, F>(
    token: String,
    gateway: Arc<AgentGateway<S, P, V, J, C, M, F>>,
) -> Result<impl Reply, Rejection>
where
    S: ServerRepository,
    P: ProvisioningStepRepository,
    V: ServiceRepository,
    J: JobRepository,
    C: Clock + Send + Sync,
    M: MetricsRecorder,
    F: FirewallRuleRepository,
{
    let response = gateway.confirm_firewall(&token).await.map_err(reject)?;
    Ok(warp::reply::json(&response))
}
