//! Modelo de entidad codificada
//!
//! Todas las entidades de la jerarquía comparten la misma forma: un código
//! inmutable, un flag `active` (borrado lógico) y un payload inerte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity_kind::EntityKind;
use super::payload::EntityPayload;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedEntity {
    pub id: Uuid,
    pub kind: EntityKind,
    /// Código jerárquico completo (p. ej. "030101" para una rota)
    pub code: String,
    pub parent_id: Option<Uuid>,
    /// Secuencia dentro del padre; solo en niveles secuenciados
    pub sequence: Option<u8>,
    pub active: bool,
    pub payload: EntityPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro a insertar dentro de la transacción de asignación
#[derive(Debug, Clone)]
pub struct NewCodedEntity {
    pub kind: EntityKind,
    pub code: String,
    pub parent_id: Option<Uuid>,
    pub sequence: Option<u8>,
    pub payload: EntityPayload,
}

impl NewCodedEntity {
    pub fn into_entity(self, now: DateTime<Utc>) -> CodedEntity {
        CodedEntity {
            id: Uuid::new_v4(),
            kind: self.kind,
            code: self.code,
            parent_id: self.parent_id,
            sequence: self.sequence,
            active: true,
            payload: self.payload,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Referencia al padre de una nueva entidad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl ParentRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

/// Lo que el asignador necesita saber del padre
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRecord {
    pub id: Uuid,
    pub kind: EntityKind,
    pub code: String,
    pub active: bool,
}

impl From<&CodedEntity> for ParentRecord {
    fn from(entity: &CodedEntity) -> Self {
        Self {
            id: entity.id,
            kind: entity.kind,
            code: entity.code.clone(),
            active: entity.active,
        }
    }
}

/// Filtros para listados
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityFilter {
    pub kind: Option<EntityKind>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EntityFilter {
    pub fn of_kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, entity: &CodedEntity) -> bool {
        self.kind.map_or(true, |kind| entity.kind == kind)
            && self.parent_id.map_or(true, |parent| entity.parent_id == Some(parent))
            && (self.include_inactive || entity.active)
    }
}
