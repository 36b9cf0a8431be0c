use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    ApplicationAction, ApplicationId, ApplicationRecord, ApplicationStatusView,
    ApplicationSubmission, Reassignment,
};
use super::repository::ApplicationRepository;
use super::scoring::ScoreComponent;
use super::service::{ApplicationCommand, ApplicationService};
use crate::workflows::coordinator::EventPublisher;
use crate::workflows::directory::{ProjectDirectory, ProjectId, UserId};
use crate::workflows::http::{
    actor_from_headers, error_response, expected_version, optional_body, required_body,
    ACTOR_ID_HEADER,
};
use crate::workflows::EngineError;

/// Router builder exposing the screening endpoints.
pub fn application_router<R, P, E>(service: Arc<ApplicationService<R, P, E>>) -> Router
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<R, P, E>))
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<R, P, E>),
        )
        .route(
            "/api/v1/applications/:application_id/:action",
            post(action_handler::<R, P, E>),
        )
        .route(
            "/api/v1/projects/:project_id/applications",
            get(ranked_handler::<R, P, E>),
        )
        .route(
            "/api/v1/projects/:project_id/candidate",
            get(candidate_handler::<R, P, E>),
        )
        .route(
            "/api/v1/projects/:project_id/applications/:application_id/reassign",
            post(reassign_handler::<R, P, E>),
        )
        .with_state(service)
}

/// Optional fields carried by the generic action endpoint.
#[derive(Debug, Default, Deserialize)]
struct ActionBody {
    #[serde(default)]
    partner_ids: Vec<UserId>,
    #[serde(default)]
    value: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ReassignBody {
    new_application_id: ApplicationId,
}

#[derive(Debug, Serialize)]
struct ApplicationDetail {
    #[serde(flatten)]
    view: ApplicationStatusView,
    score_breakdown: Vec<ScoreComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_actions: Option<Vec<&'static str>>,
}

pub(crate) async fn submit_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let outcome = actor_from_headers(&headers).and_then(|actor| {
        let submission: ApplicationSubmission = required_body(&body)?;
        service.submit(&actor, submission)
    });

    match outcome {
        Ok(record) => (StatusCode::CREATED, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    match describe(&service, &ApplicationId(application_id), &headers) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn action_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    Path((application_id, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let id = ApplicationId(application_id);
    match run_action(&service, &id, &action, &headers, &body) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn ranked_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    Path(project_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.ranked(&ProjectId(project_id)) {
        Ok(records) => {
            let views: Vec<ApplicationStatusView> =
                records.iter().map(ApplicationRecord::status_view).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn candidate_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    Path(project_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.default_candidate(&ProjectId(project_id)) {
        Ok(candidate) => {
            let payload = json!({
                "candidate": candidate.as_ref().map(ApplicationRecord::status_view),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reassign_handler<R, P, E>(
    State(service): State<Arc<ApplicationService<R, P, E>>>,
    Path((project_id, assigned_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let outcome = actor_from_headers(&headers).and_then(|actor| {
        let version = expected_version(&headers)?;
        let request: ReassignBody = required_body(&body)?;
        service.reassign(
            &actor,
            &ProjectId(project_id),
            &request.new_application_id,
            Some(&ApplicationId(assigned_id)),
            version,
        )
    });

    match outcome {
        Ok(Reassignment {
            assigned,
            displaced,
        }) => {
            let payload = json!({
                "assigned": assigned.status_view(),
                "displaced": displaced.as_ref().map(ApplicationRecord::status_view),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn describe<R, P, E>(
    service: &ApplicationService<R, P, E>,
    id: &ApplicationId,
    headers: &HeaderMap,
) -> Result<ApplicationDetail, EngineError>
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let record = service.get(id)?;
    let allowed_actions = if headers.contains_key(ACTOR_ID_HEADER) {
        let actor = actor_from_headers(headers)?;
        let actions = service.allowed_actions(&actor, id)?;
        Some(actions.into_iter().map(ApplicationAction::label).collect())
    } else {
        None
    };

    Ok(ApplicationDetail {
        view: record.status_view(),
        score_breakdown: service.score_breakdown(id)?,
        allowed_actions,
    })
}

fn run_action<R, P, E>(
    service: &ApplicationService<R, P, E>,
    id: &ApplicationId,
    action: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<ApplicationRecord, EngineError>
where
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let action = ApplicationAction::parse(action)
        .ok_or_else(|| EngineError::NotFound(format!("application action '{action}'")))?;
    let actor = actor_from_headers(headers)?;
    let expected = expected_version(headers)?;
    let payload: ActionBody = optional_body(body)?;

    let command = match action {
        ApplicationAction::Recommend => ApplicationCommand::Recommend {
            partner_ids: payload.partner_ids,
        },
        ApplicationAction::Score => ApplicationCommand::Score {
            value: payload.value.ok_or_else(|| {
                EngineError::Validation("score requires a numeric 'value'".to_string())
            })?,
        },
        other => ApplicationCommand::Transition(other),
    };

    service.perform(&actor, id, command, expected)
}
