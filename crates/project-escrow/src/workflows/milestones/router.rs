use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{
    Milestone, MilestoneAction, MilestoneChanges, MilestoneDraft, MilestoneId,
    MilestoneStatusView,
};
use super::repository::MilestoneRepository;
use super::service::MilestoneService;
use crate::workflows::applications::ApplicationRepository;
use crate::workflows::coordinator::EventPublisher;
use crate::workflows::directory::{ProjectDirectory, ProjectId};
use crate::workflows::http::{
    actor_from_headers, error_response, expected_version, optional_body, required_body,
    ACTOR_ID_HEADER,
};
use crate::workflows::EngineError;

/// Router builder exposing the milestone escrow endpoints.
pub fn milestone_router<M, R, P, E>(service: Arc<MilestoneService<M, R, P, E>>) -> Router
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/milestones", post(create_handler::<M, R, P, E>))
        .route(
            "/api/v1/milestones/:milestone_id",
            get(status_handler::<M, R, P, E>)
                .put(edit_handler::<M, R, P, E>)
                .delete(delete_handler::<M, R, P, E>),
        )
        .route(
            "/api/v1/milestones/:milestone_id/:action",
            post(action_handler::<M, R, P, E>),
        )
        .route(
            "/api/v1/projects/:project_id/milestones",
            get(list_handler::<M, R, P, E>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
struct ActionBody {
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) async fn create_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let outcome = actor_from_headers(&headers).and_then(|actor| {
        let draft: MilestoneDraft = required_body(&body)?;
        service.create(&actor, draft)
    });

    match outcome {
        Ok(milestone) => (StatusCode::CREATED, Json(milestone.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    Path(milestone_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let id = MilestoneId(milestone_id);
    let outcome = if headers.contains_key(ACTOR_ID_HEADER) {
        actor_from_headers(&headers).and_then(|actor| service.view_for(&actor, &id))
    } else {
        service.get(&id).map(|milestone| milestone.status_view())
    };

    match outcome {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    Path(milestone_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let outcome = actor_from_headers(&headers).and_then(|actor| {
        let expected = expected_version(&headers)?;
        let changes: MilestoneChanges = required_body(&body)?;
        service.edit(&actor, &MilestoneId(milestone_id), changes, expected)
    });

    match outcome {
        Ok(milestone) => (StatusCode::OK, Json(milestone.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    Path(milestone_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let outcome = actor_from_headers(&headers).and_then(|actor| {
        let expected = expected_version(&headers)?;
        service.delete(&actor, &MilestoneId(milestone_id), expected)
    });

    match outcome {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn action_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    Path((milestone_id, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    let id = MilestoneId(milestone_id);
    match run_action(&service, &id, &action, &headers, &body) {
        Ok(milestone) => (StatusCode::OK, Json(milestone.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<M, R, P, E>(
    State(service): State<Arc<MilestoneService<M, R, P, E>>>,
    Path(project_id): Path<String>,
) -> Response
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    match service.for_project(&ProjectId(project_id)) {
        Ok(milestones) => {
            let views: Vec<MilestoneStatusView> =
                milestones.iter().map(Milestone::status_view).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn run_action<M, R, P, E>(
    service: &MilestoneService<M, R, P, E>,
    id: &MilestoneId,
    action: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Milestone, EngineError>
where
    M: MilestoneRepository + 'static,
    R: ApplicationRepository + 'static,
    P: ProjectDirectory + 'static,
    E: EventPublisher + 'static,
{
    // Edit and delete have their own verbs on the resource itself.
    let action = MilestoneAction::parse(action)
        .filter(|parsed| !matches!(parsed, MilestoneAction::Edit | MilestoneAction::Delete))
        .ok_or_else(|| EngineError::NotFound(format!("milestone action '{action}'")))?;
    let actor = actor_from_headers(headers)?;
    let expected = expected_version(headers)?;
    let payload: ActionBody = optional_body(body)?;

    service.perform(&actor, id, action, payload.reason, expected)
}
