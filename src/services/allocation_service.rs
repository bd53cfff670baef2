//! Servicio de asignación de códigos
//!
//! Orquesta parser, asignador de secuencias, ensamblador y validador de
//! duplicados dentro de UNA transacción por intento: resolver padre →
//! reservar secuencia → ensamblar → validar → insertar → confirmar. Los
//! conflictos transitorios del almacén reinician el intento completo.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::code_assembler;
use super::code_parser::{self, HierarchySegments};
use super::duplicate_validator::{normalize_code, CodeIndex, DuplicateValidator, InvalidReason, ValidationOutcome};
use super::sequence_allocator::SequenceAllocator;
use crate::config::AllocationConfig;
use crate::models::{CodedEntity, EntityFilter, EntityKind, EntityPayload, NewCodedEntity, ParentRef};
use crate::repositories::code_store::{CodeStore, StoreError, StoreTransaction};
use crate::utils::errors::AllocationError;
use crate::utils::validation::validate_external_segment;

/// Vista previa de la próxima asignación; no reserva nada
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodePreview {
    pub parent_code: String,
    pub child_kind: EntityKind,
    pub sequence: u32,
    pub code: String,
}

/// Hallazgo de la auditoría de consistencia
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub entity_id: Uuid,
    pub code: String,
    pub problem: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub kind: EntityKind,
    pub checked: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Qué crear dentro de la transacción
enum Creation<'a> {
    Child { parent: ParentRef },
    Localidade { code: &'a str },
    Secao { localidade_id: Uuid, segment: &'a str },
}

/// Tipo hijo numerado bajo `parent_kind`; se informa el tipo que no se secuencia
fn sequenced_child(parent_kind: EntityKind) -> Result<EntityKind, AllocationError> {
    let child_kind = parent_kind
        .child()
        .ok_or(AllocationError::NotSequenced(parent_kind))?;
    if child_kind.is_sequenced() {
        Ok(child_kind)
    } else {
        Err(AllocationError::NotSequenced(child_kind))
    }
}

#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn CodeStore>,
    config: AllocationConfig,
}

impl AllocationService {
    pub fn new(store: Arc<dyn CodeStore>, config: AllocationConfig) -> Self {
        Self { store, config }
    }

    /// `allocate(parentCode)` puro: código que tendría el hijo con esa secuencia
    pub fn allocate(parent_code: &str, sequence: u32) -> Result<String, AllocationError> {
        code_assembler::assemble(parent_code, sequence)
    }

    pub fn decompose(code: &str) -> Result<HierarchySegments, AllocationError> {
        code_parser::decompose(code)
    }

    /// Crear una rota, ponto u operador bajo `parent`, con código asignado.
    /// Única operación que reserva un código de forma duradera.
    pub async fn create_coded_entity(
        &self,
        parent: ParentRef,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        sequenced_child(parent.kind)?;
        self.run(Creation::Child { parent }, payload).await
    }

    /// Registrar una localidade con su código asignado externamente
    pub async fn register_localidade(
        &self,
        code: &str,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        validate_external_segment(code)
            .map_err(|_| AllocationError::malformed(code, "localidade codes are 2 letters or digits"))?;
        self.run(Creation::Localidade { code }, payload).await
    }

    /// Registrar una secao; su código completo es localidade + segmento
    pub async fn register_secao(
        &self,
        localidade_id: Uuid,
        segment: &str,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        validate_external_segment(segment)
            .map_err(|_| AllocationError::malformed(segment, "secao segments are 2 letters or digits"))?;
        self.run(Creation::Secao { localidade_id, segment }, payload).await
    }

    async fn run(
        &self,
        creation: Creation<'_>,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let mut tx = self.store.begin().await?;
            match Self::attempt(tx.as_mut(), &creation, payload.clone()).await {
                Ok(entity) => match tx.commit().await {
                    Ok(()) => {
                        info!(
                            kind = %entity.kind,
                            code = %entity.code,
                            attempt,
                            "✅ Código asignado"
                        );
                        return Ok(entity);
                    }
                    Err(StoreError::UniqueViolation(_)) => {
                        return Err(AllocationError::DuplicateCode {
                            kind: entity.kind,
                            code: entity.code,
                        })
                    }
                    Err(e) if e.is_transient() => {
                        warn!(attempt, max_attempts, error = %e, "🔁 Conflicto al confirmar, reintentando");
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(AllocationError::Store(e)) if e.is_transient() => {
                    warn!(attempt, max_attempts, error = %e, "🔁 Conflicto en la transacción, reintentando");
                }
                Err(e) => return Err(e),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        warn!(attempts = max_attempts, "❌ Asignación abandonada tras conflictos repetidos");
        Err(AllocationError::AllocationConflict {
            attempts: max_attempts,
        })
    }

    async fn attempt(
        tx: &mut dyn StoreTransaction,
        creation: &Creation<'_>,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        let new_entity = match creation {
            Creation::Child { parent } => {
                let record = tx
                    .parent(*parent)
                    .await?
                    .filter(|p| p.active)
                    .ok_or(AllocationError::ParentNotFound {
                        kind: parent.kind,
                        id: parent.id,
                    })?;
                let child_kind = sequenced_child(parent.kind)?;
                let sequence = SequenceAllocator::reserve(tx, &record, child_kind).await?;
                let code = code_assembler::assemble(&record.code, sequence)?;
                NewCodedEntity {
                    kind: child_kind,
                    code,
                    parent_id: Some(record.id),
                    sequence: u8::try_from(sequence).ok(),
                    payload,
                }
            }
            Creation::Localidade { code } => NewCodedEntity {
                kind: EntityKind::Localidade,
                code: code.to_string(),
                parent_id: None,
                sequence: None,
                payload,
            },
            Creation::Secao { localidade_id, segment } => {
                let parent = ParentRef::new(EntityKind::Localidade, *localidade_id);
                let record = tx
                    .parent(parent)
                    .await?
                    .filter(|p| p.active)
                    .ok_or(AllocationError::ParentNotFound {
                        kind: parent.kind,
                        id: parent.id,
                    })?;
                NewCodedEntity {
                    kind: EntityKind::Secao,
                    code: format!("{}{}", record.code, segment),
                    parent_id: Some(record.id),
                    sequence: None,
                    payload,
                }
            }
        };

        let (kind, code) = (new_entity.kind, new_entity.code.clone());
        DuplicateValidator::ensure_unique(tx, kind, &code).await?;
        tx.insert(new_entity).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => AllocationError::DuplicateCode { kind, code },
            other => other.into(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.base_backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let ceiling = base.saturating_mul(u64::from(attempt));
        Duration::from_millis(rand::thread_rng().gen_range(base / 2..=ceiling))
    }

    /// Código que produciría la próxima asignación bajo `parent`, sin reservarlo
    pub async fn preview_next_code(&self, parent: ParentRef) -> Result<CodePreview, AllocationError> {
        let child_kind = sequenced_child(parent.kind)?;
        let record = self
            .store
            .find_by_id(parent.id)
            .await?
            .filter(|p| p.kind == parent.kind && p.active)
            .ok_or(AllocationError::ParentNotFound {
                kind: parent.kind,
                id: parent.id,
            })?;

        let last = self.store.last_sequence(record.id, child_kind).await?;
        if last >= code_assembler::MAX_SEQUENCE {
            return Err(AllocationError::SequenceExhausted {
                parent_code: record.code,
                max: code_assembler::MAX_SEQUENCE,
            });
        }
        let sequence = last + 1;
        Ok(CodePreview {
            code: code_assembler::assemble(&record.code, sequence)?,
            parent_code: record.code,
            child_kind,
            sequence,
        })
    }

    /// `validate(code, kind)` independiente, para diagnóstico o carga de datos heredados
    pub async fn validate(&self, code: &str, kind: EntityKind) -> Result<ValidationOutcome, AllocationError> {
        if code_parser::ensure_shape(code, kind).is_err() {
            return Ok(ValidationOutcome::invalid(InvalidReason::MalformedCode));
        }
        let scope = CodeIndex::from_codes(self.store.codes_of_kind(kind).await?);
        Ok(DuplicateValidator::validate(code, &scope))
    }

    pub async fn get(&self, id: Uuid) -> Result<CodedEntity, AllocationError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AllocationError::NotFound(id))
    }

    pub async fn list(&self, filter: &EntityFilter) -> Result<Vec<CodedEntity>, AllocationError> {
        Ok(self.store.list(filter).await?)
    }

    /// Cambia solo el payload; el código es inmutable
    pub async fn update_payload(
        &self,
        id: Uuid,
        payload: EntityPayload,
    ) -> Result<CodedEntity, AllocationError> {
        self.store
            .update_payload(id, payload)
            .await?
            .ok_or(AllocationError::NotFound(id))
    }

    /// Borrado lógico: el código sigue ocupado para siempre
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<CodedEntity, AllocationError> {
        let entity = self
            .store
            .set_active(id, active)
            .await?
            .ok_or(AllocationError::NotFound(id))?;
        info!(kind = %entity.kind, code = %entity.code, active, "🗂️ Estado de entidad actualizado");
        Ok(entity)
    }

    /// Auditoría de consistencia de todos los códigos de un tipo
    pub async fn audit(&self, kind: EntityKind) -> Result<AuditReport, AllocationError> {
        let entities = self
            .store
            .list(&EntityFilter {
                include_inactive: true,
                ..EntityFilter::of_kind(kind)
            })
            .await?;

        let mut parent_codes: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut seen: HashMap<String, Uuid> = HashMap::new();
        let mut findings = Vec::new();

        for entity in &entities {
            let mut report = |problem: String| {
                findings.push(AuditFinding {
                    entity_id: entity.id,
                    code: entity.code.clone(),
                    problem,
                })
            };

            if let Err(e) = code_parser::ensure_shape(&entity.code, kind) {
                report(e.to_string());
            } else if kind.is_sequenced() {
                if let Ok(segments) = code_parser::decompose(&entity.code) {
                    if segments.sequence != entity.sequence {
                        report(format!(
                            "stored sequence {:?} does not match code segment {:?}",
                            entity.sequence, segments.sequence
                        ));
                    }
                }
            }

            if let Some(first) = seen.insert(normalize_code(&entity.code), entity.id) {
                report(format!("duplicates the code of entity {}", first));
            }

            match (kind.parent(), entity.parent_id) {
                (None, _) => {}
                (Some(_), None) => report("missing parent reference".to_string()),
                (Some(_), Some(parent_id)) => {
                    if !parent_codes.contains_key(&parent_id) {
                        let code = self.store.find_by_id(parent_id).await?.map(|p| p.code);
                        parent_codes.insert(parent_id, code);
                    }
                    match parent_codes.get(&parent_id).cloned().flatten() {
                        None => report(format!("parent {} does not exist", parent_id)),
                        Some(parent_code) if !entity.code.starts_with(&parent_code) => report(format!(
                            "code does not start with parent code '{}'",
                            parent_code
                        )),
                        Some(_) => {}
                    }
                }
            }
        }

        if !findings.is_empty() {
            warn!(%kind, findings = findings.len(), "⚠️ Auditoría con inconsistencias");
        }
        Ok(AuditReport {
            kind,
            checked: entities.len(),
            findings,
        })
    }
}
