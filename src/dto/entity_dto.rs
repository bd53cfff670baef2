use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CodedEntity, EntityFilter, EntityKind, EntityPayload};

// Request para crear una entidad.
// Localidade: `code` (2). Secao: `parent_id` + `code` (2). Resto: solo `parent_id`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntityRequest {
    pub parent_id: Option<Uuid>,

    #[validate(length(equal = 2))]
    pub code: Option<String>,

    #[validate]
    pub payload: EntityPayload,
}

// Request para actualizar: solo payload, el código no se puede cambiar
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntityRequest {
    #[validate]
    pub payload: EntityPayload,
}

// Filtros de listado
#[derive(Debug, Default, Deserialize)]
pub struct ListEntitiesQuery {
    pub parent_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListEntitiesQuery {
    pub fn into_filter(self, kind: EntityKind) -> EntityFilter {
        EntityFilter {
            kind: Some(kind),
            parent_id: self.parent_id,
            include_inactive: self.include_inactive.unwrap_or(false),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

// Response de entidad
#[derive(Debug, Serialize, Deserialize)]
pub struct EntityResponse {
    pub id: Uuid,
    pub kind: EntityKind,
    pub code: String,
    pub parent_id: Option<Uuid>,
    pub sequence: Option<u8>,
    pub active: bool,
    pub payload: EntityPayload,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CodedEntity> for EntityResponse {
    fn from(entity: CodedEntity) -> Self {
        Self {
            id: entity.id,
            kind: entity.kind,
            code: entity.code,
            parent_id: entity.parent_id,
            sequence: entity.sequence,
            active: entity.active,
            payload: entity.payload,
            created_at: entity.created_at.to_rfc3339(),
            updated_at: entity.updated_at.to_rfc3339(),
        }
    }
}
