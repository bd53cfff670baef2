//! Contrato del almacén de códigos
//!
//! El asignador solo necesita dos capacidades del entorno: leer el estado de
//! un ámbito padre y confirmar una nueva entidad de forma atómica. Todo lo que
//! muta el contador o el conjunto de códigos emitidos pasa por
//! [`StoreTransaction`]; al soltar una transacción sin `commit` se descarta.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CodedEntity, EntityFilter, EntityKind, EntityPayload, NewCodedEntity, ParentRef, ParentRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conflicto transitorio con otro escritor; la operación completa puede reintentarse
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Violación del índice único de códigos
    #[error("unique code constraint violated: {0}")]
    UniqueViolation(String),

    #[error("backend error: {0}")]
    Backend(String),

    /// Fila persistida que no se puede mapear al modelo
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Transacción abierta contra el almacén
#[async_trait]
pub trait StoreTransaction: Send {
    /// Resolver el padre; `None` si no existe o es de otro tipo
    async fn parent(&mut self, parent: ParentRef) -> Result<Option<ParentRecord>, StoreError>;

    /// Incremento atómico del contador del ámbito (padre, tipo hijo).
    /// Devuelve el valor ya incrementado. Un ámbito sin contador se siembra con
    /// la mayor secuencia existente bajo ese padre.
    async fn reserve_sequence(
        &mut self,
        parent_id: Uuid,
        child_kind: EntityKind,
    ) -> Result<u32, StoreError>;

    /// ¿Existe ya el código (normalizado) entre todos los del tipo, activos o no?
    async fn code_taken(&mut self, kind: EntityKind, normalized_code: &str) -> Result<bool, StoreError>;

    async fn insert(&mut self, entity: NewCodedEntity) -> Result<CodedEntity, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Almacén de entidades codificadas
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CodedEntity>, StoreError>;

    async fn list(&self, filter: &EntityFilter) -> Result<Vec<CodedEntity>, StoreError>;

    /// Todos los códigos emitidos de un tipo, incluidos los inactivos
    async fn codes_of_kind(&self, kind: EntityKind) -> Result<Vec<String>, StoreError>;

    /// Último valor del contador sin reservar nada (para vista previa)
    async fn last_sequence(&self, parent_id: Uuid, child_kind: EntityKind) -> Result<u32, StoreError>;

    async fn update_payload(
        &self,
        id: Uuid,
        payload: EntityPayload,
    ) -> Result<Option<CodedEntity>, StoreError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<CodedEntity>, StoreError>;
}
