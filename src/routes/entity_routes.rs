use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::controllers::entity_controller::EntityController;
use crate::dto::entity_dto::{CreateEntityRequest, EntityResponse, ListEntitiesQuery, UpdateEntityRequest};
use crate::dto::ApiResponse;
use crate::models::EntityKind;
use crate::services::CodePreview;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Router CRUD para un tipo de entidad; el tipo viaja como extensión
pub fn create_entity_router(kind: EntityKind) -> Router<AppState> {
    Router::new()
        .route("/", post(create_entity).get(list_entities))
        .route("/:id", get(get_entity).put(update_entity).delete(deactivate_entity))
        .route("/:id/activate", post(activate_entity))
        .route("/:id/next-code", get(preview_next_code))
        .layer(Extension(kind))
}

fn controller(state: &AppState, kind: EntityKind) -> EntityController {
    EntityController::new(state.allocation_service(), kind)
}

async fn create_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Json(request): Json<CreateEntityRequest>,
) -> Result<Json<ApiResponse<EntityResponse>>, AppError> {
    let response = controller(&state, kind).create(request).await?;
    Ok(Json(response))
}

async fn list_entities(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Query(query): Query<ListEntitiesQuery>,
) -> Result<Json<Vec<EntityResponse>>, AppError> {
    let response = controller(&state, kind).list(query).await?;
    Ok(Json(response))
}

async fn get_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntityResponse>, AppError> {
    let response = controller(&state, kind).get_by_id(id).await?;
    Ok(Json(response))
}

async fn update_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEntityRequest>,
) -> Result<Json<ApiResponse<EntityResponse>>, AppError> {
    let response = controller(&state, kind).update(id, request).await?;
    Ok(Json(response))
}

async fn deactivate_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EntityResponse>>, AppError> {
    let response = controller(&state, kind).set_active(id, false).await?;
    Ok(Json(response))
}

async fn activate_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EntityResponse>>, AppError> {
    let response = controller(&state, kind).set_active(id, true).await?;
    Ok(Json(response))
}

async fn preview_next_code(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<CodePreview>, AppError> {
    let response = controller(&state, kind).preview_next_code(id).await?;
    Ok(Json(response))
}
