use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::controllers::code_controller::CodeController;
use crate::dto::code_dto::{AssembleCodeRequest, AssembleCodeResponse, AuditQuery, ValidateCodeRequest};
use crate::services::{AuditReport, HierarchySegments, ValidationOutcome};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_code_router() -> Router<AppState> {
    Router::new()
        .route("/assemble", post(assemble_code))
        .route("/validate", post(validate_code))
        .route("/audit", get(audit_codes))
        .route("/:code/decompose", get(decompose_code))
}

async fn assemble_code(
    State(state): State<AppState>,
    Json(request): Json<AssembleCodeRequest>,
) -> Result<Json<AssembleCodeResponse>, AppError> {
    let controller = CodeController::new(state.allocation_service());
    Ok(Json(controller.assemble(request)?))
}

async fn validate_code(
    State(state): State<AppState>,
    Json(request): Json<ValidateCodeRequest>,
) -> Result<Json<ValidationOutcome>, AppError> {
    let controller = CodeController::new(state.allocation_service());
    Ok(Json(controller.validate(request).await?))
}

async fn decompose_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<HierarchySegments>, AppError> {
    let controller = CodeController::new(state.allocation_service());
    Ok(Json(controller.decompose(&code)?))
}

async fn audit_codes(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditReport>, AppError> {
    let controller = CodeController::new(state.allocation_service());
    Ok(Json(controller.audit(query.kind).await?))
}
