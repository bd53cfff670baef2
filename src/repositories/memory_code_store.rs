//! Almacén en memoria
//!
//! Cada ámbito (padre, tipo hijo) tiene un único escritor: la transacción que
//! reserva una secuencia retiene el candado del ámbito hasta `commit` o drop,
//! igual que la fila bloqueada en `code_sequences` con Postgres. El resto es
//! optimista: el commit vuelve a comprobar versiones de contador, padres leídos
//! y unicidad, y falla con [`StoreError::Conflict`] si algo cambió. Se usa en
//! tests y en despliegues locales sin Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::code_store::{CodeStore, StoreError, StoreTransaction};
use crate::models::{CodedEntity, EntityFilter, EntityKind, EntityPayload, NewCodedEntity, ParentRef, ParentRecord};
use crate::services::duplicate_validator::{normalize_code, CodeIndex};

type ScopeKey = (Uuid, EntityKind);
type ScopeLocks = Mutex<HashMap<ScopeKey, Arc<AsyncMutex<()>>>>;

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u32,
    version: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    entities: HashMap<Uuid, CodedEntity>,
    indexes: HashMap<EntityKind, CodeIndex>,
    counters: HashMap<ScopeKey, Counter>,
}

impl MemoryState {
    fn counter(&self, key: &ScopeKey) -> Counter {
        self.counters.get(key).copied().unwrap_or_else(|| Counter {
            value: self.max_child_sequence(key),
            version: 0,
        })
    }

    /// Semilla para ámbitos sin contador (datos heredados)
    fn max_child_sequence(&self, (parent_id, child_kind): &ScopeKey) -> u32 {
        self.entities
            .values()
            .filter(|e| e.kind == *child_kind && e.parent_id == Some(*parent_id))
            .filter_map(|e| e.sequence)
            .map(u32::from)
            .max()
            .unwrap_or(0)
    }

    fn index_mut(&mut self, kind: EntityKind) -> &mut CodeIndex {
        self.indexes.entry(kind).or_default()
    }

    fn code_taken(&self, kind: EntityKind, normalized: &str) -> bool {
        self.indexes
            .get(&kind)
            .map_or(false, |index| index.contains(normalized))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCodeStore {
    state: Arc<Mutex<MemoryState>>,
    scope_locks: Arc<ScopeLocks>,
    injected_conflicts: Arc<AtomicU32>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar con conflicto los próximos `count` commits
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Carga una entidad heredada tal cual, sin pasar por el asignador.
    /// No toca contadores: el siguiente `reserve_sequence` se siembra con ella.
    pub fn import_legacy(&self, entity: CodedEntity) -> Result<(), StoreError> {
        let mut state = lock(&self.state)?;
        state.index_mut(entity.kind).insert(&entity.code);
        state.entities.insert(entity.id, entity);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            scope_locks: Arc::clone(&self.scope_locks),
            injected_conflicts: Arc::clone(&self.injected_conflicts),
            held_scopes: HashMap::new(),
            counter_reads: HashMap::new(),
            counter_writes: HashMap::new(),
            parent_reads: Vec::new(),
            inserts: Vec::new(),
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CodedEntity>, StoreError> {
        Ok(self.lock()?.entities.get(&id).cloned())
    }

    async fn list(&self, filter: &EntityFilter) -> Result<Vec<CodedEntity>, StoreError> {
        let state = self.lock()?;
        let mut entities: Vec<CodedEntity> = state
            .entities
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.code.cmp(&b.code)));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(entities.into_iter().skip(offset).take(limit).collect())
    }

    async fn codes_of_kind(&self, kind: EntityKind) -> Result<Vec<String>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.code.clone())
            .collect())
    }

    async fn last_sequence(&self, parent_id: Uuid, child_kind: EntityKind) -> Result<u32, StoreError> {
        Ok(self.lock()?.counter(&(parent_id, child_kind)).value)
    }

    async fn update_payload(
        &self,
        id: Uuid,
        payload: EntityPayload,
    ) -> Result<Option<CodedEntity>, StoreError> {
        let mut state = self.lock()?;
        Ok(state.entities.get_mut(&id).map(|entity| {
            entity.payload = payload;
            entity.updated_at = Utc::now();
            entity.clone()
        }))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<CodedEntity>, StoreError> {
        let mut state = self.lock()?;
        Ok(state.entities.get_mut(&id).map(|entity| {
            entity.active = active;
            entity.updated_at = Utc::now();
            entity.clone()
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    scope_locks: Arc<ScopeLocks>,
    injected_conflicts: Arc<AtomicU32>,
    /// Candados de ámbito retenidos hasta el final de la transacción
    held_scopes: HashMap<ScopeKey, OwnedMutexGuard<()>>,
    counter_reads: HashMap<ScopeKey, u64>,
    counter_writes: HashMap<ScopeKey, u32>,
    parent_reads: Vec<Uuid>,
    inserts: Vec<CodedEntity>,
}

impl MemoryTransaction {
    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Esperar a ser el único escritor del ámbito
    async fn acquire_scope(&mut self, key: ScopeKey) -> Result<(), StoreError> {
        if self.held_scopes.contains_key(&key) {
            return Ok(());
        }
        let scope = {
            let mut locks = self
                .scope_locks
                .lock()
                .map_err(|_| StoreError::Backend("memory store scope locks poisoned".to_string()))?;
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = scope.lock_owned().await;
        self.held_scopes.insert(key, guard);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn parent(&mut self, parent: ParentRef) -> Result<Option<ParentRecord>, StoreError> {
        tokio::task::yield_now().await;
        let state = lock(&self.state)?;
        let record = state
            .entities
            .get(&parent.id)
            .filter(|e| e.kind == parent.kind)
            .map(ParentRecord::from);
        if record.is_some() {
            self.parent_reads.push(parent.id);
        }
        Ok(record)
    }

    async fn reserve_sequence(
        &mut self,
        parent_id: Uuid,
        child_kind: EntityKind,
    ) -> Result<u32, StoreError> {
        let key = (parent_id, child_kind);
        self.acquire_scope(key).await?;
        tokio::task::yield_now().await;
        let current = match self.counter_writes.get(&key) {
            Some(value) => *value,
            None => {
                let counter = lock(&self.state)?.counter(&key);
                self.counter_reads.insert(key, counter.version);
                counter.value
            }
        };
        let next = current + 1;
        self.counter_writes.insert(key, next);
        Ok(next)
    }

    async fn code_taken(&mut self, kind: EntityKind, normalized_code: &str) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let pending = self
            .inserts
            .iter()
            .any(|e| e.kind == kind && normalize_code(&e.code) == normalized_code);
        Ok(pending || lock(&self.state)?.code_taken(kind, normalized_code))
    }

    async fn insert(&mut self, entity: NewCodedEntity) -> Result<CodedEntity, StoreError> {
        let entity = entity.into_entity(Utc::now());
        self.inserts.push(entity.clone());
        Ok(entity)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        if this.take_injected_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        let mut state = lock(&this.state)?;

        for (key, observed) in &this.counter_reads {
            if state.counter(key).version != *observed {
                return Err(StoreError::Conflict(format!(
                    "sequence scope {}/{} changed concurrently",
                    key.0, key.1
                )));
            }
        }

        for parent_id in &this.parent_reads {
            if !state.entities.get(parent_id).map_or(false, |p| p.active) {
                return Err(StoreError::Conflict(format!(
                    "parent {} changed concurrently",
                    parent_id
                )));
            }
        }

        for entity in &this.inserts {
            if state.code_taken(entity.kind, &normalize_code(&entity.code)) {
                return Err(StoreError::UniqueViolation(entity.code.clone()));
            }
        }

        for (key, value) in this.counter_writes {
            let version = state.counter(&key).version + 1;
            state.counters.insert(key, Counter { value, version });
        }

        for entity in this.inserts {
            debug!(kind = %entity.kind, code = %entity.code, "💾 Entidad confirmada en memoria");
            state.index_mut(entity.kind).insert(&entity.code);
            state.entities.insert(entity.id, entity);
        }

        Ok(())
    }
}
