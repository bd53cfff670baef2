//! Sistema de manejo de errores
//!
//! Este módulo define los errores de asignación de códigos y su
//! conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::EntityKind;
use crate::repositories::code_store::StoreError;

/// Errores del asignador: cada variante nombra el invariante que falló
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("{kind} parent '{id}' not found or inactive")]
    ParentNotFound { kind: EntityKind, id: Uuid },

    #[error("{kind} code '{code}' is already taken")]
    DuplicateCode { kind: EntityKind, code: String },

    #[error("sequence exhausted under parent '{parent_code}': {max} children already issued")]
    SequenceExhausted { parent_code: String, max: u32 },

    #[error("sequence {0} is out of range 1-99")]
    SequenceOutOfRange(u32),

    #[error("malformed code '{code}': {reason}")]
    MalformedCode { code: String, reason: String },

    #[error("allocation lost the race {attempts} times in a row; retry the request")]
    AllocationConflict { attempts: u32 },

    #[error("{0} codes are assigned externally, not allocated")]
    NotSequenced(EntityKind),

    #[error("entity '{0}' not found")]
    NotFound(Uuid),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AllocationError {
    pub fn malformed(code: &str, reason: impl Into<String>) -> Self {
        AllocationError::MalformedCode {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    /// Código estable expuesto a los clientes
    pub fn error_code(&self) -> &'static str {
        match self {
            AllocationError::ParentNotFound { .. } => "PARENT_NOT_FOUND",
            AllocationError::DuplicateCode { .. } => "DUPLICATE_CODE",
            AllocationError::SequenceExhausted { .. } => "SEQUENCE_EXHAUSTED",
            AllocationError::SequenceOutOfRange(_) => "SEQUENCE_OUT_OF_RANGE",
            AllocationError::MalformedCode { .. } => "MALFORMED_CODE",
            AllocationError::AllocationConflict { .. } => "ALLOCATION_CONFLICT",
            AllocationError::NotSequenced(_) => "NOT_SEQUENCED",
            AllocationError::NotFound(_) => "NOT_FOUND",
            AllocationError::Store(_) => "STORE_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AllocationError::ParentNotFound { .. } | AllocationError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AllocationError::DuplicateCode { .. } | AllocationError::SequenceExhausted { .. } => {
                StatusCode::CONFLICT
            }
            AllocationError::SequenceOutOfRange(_)
            | AllocationError::MalformedCode { .. }
            | AllocationError::NotSequenced(_) => StatusCode::BAD_REQUEST,
            AllocationError::AllocationConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AllocationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Allocation(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(error = %e, "❌ Allocation failed");
                } else {
                    tracing::warn!(error = %e, "⚠️ Allocation rejected");
                }
                let details = match &e {
                    AllocationError::Store(store) => Some(json!({ "store_error": store.to_string() })),
                    AllocationError::AllocationConflict { attempts } => {
                        Some(json!({ "attempts": attempts, "retryable": true }))
                    }
                    _ => None,
                };
                (
                    status,
                    ErrorResponse {
                        error: status
                            .canonical_reason()
                            .unwrap_or("Error")
                            .to_string(),
                        message: e.to_string(),
                        details,
                        code: Some(e.error_code().to_string()),
                    },
                )
            }

            AppError::Validation(e) => {
                tracing::warn!(error = %e, "⚠️ Validation error");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Validation Error".to_string(),
                        message: "The provided data is invalid".to_string(),
                        details: Some(json!(e)),
                        code: Some("VALIDATION_ERROR".to_string()),
                    },
                )
            }

            AppError::NotFound(msg) => {
                tracing::warn!("🔍 Resource not found: {}", msg);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error: "Not Found".to_string(),
                        message: msg,
                        details: None,
                        code: Some("NOT_FOUND".to_string()),
                    },
                )
            }

            AppError::BadRequest(msg) => {
                tracing::warn!("⚠️ Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Bad Request".to_string(),
                        message: msg,
                        details: None,
                        code: Some("BAD_REQUEST".to_string()),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de solicitud incorrecta
pub fn bad_request_error(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_status_mapping() {
        let parent = AllocationError::ParentNotFound {
            kind: EntityKind::Secao,
            id: Uuid::nil(),
        };
        assert_eq!(parent.status(), StatusCode::NOT_FOUND);
        assert_eq!(parent.error_code(), "PARENT_NOT_FOUND");

        let exhausted = AllocationError::SequenceExhausted {
            parent_code: "0301".to_string(),
            max: 99,
        };
        assert_eq!(exhausted.status(), StatusCode::CONFLICT);

        let conflict = AllocationError::AllocationConflict { attempts: 5 };
        assert_eq!(conflict.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_app_error_response_status() {
        let response = AppError::from(AllocationError::DuplicateCode {
            kind: EntityKind::Rota,
            code: "030101".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = bad_request_error("missing parent_id").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
