//! Almacén PostgreSQL
//!
//! El contador de cada ámbito vive en `code_sequences` y se incrementa con
//! `INSERT … ON CONFLICT DO UPDATE … RETURNING`, que bloquea la fila del
//! ámbito hasta el commit. El índice único `(kind, UPPER(code))` respalda al
//! validador de duplicados.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::code_store::{CodeStore, StoreError, StoreTransaction};
use crate::models::{CodedEntity, EntityFilter, EntityKind, EntityPayload, NewCodedEntity, ParentRef, ParentRecord};

const ENTITY_COLUMNS: &str =
    "id, kind, code, parent_id, sequence, active, payload, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    code: String,
    parent_id: Option<Uuid>,
    sequence: Option<i16>,
    active: bool,
    payload: Json<EntityPayload>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntityRow> for CodedEntity {
    type Error = StoreError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<EntityKind>()
            .map_err(|e| StoreError::Corrupt(format!("entity {}: {}", row.id, e)))?;
        let sequence = row
            .sequence
            .map(u8::try_from)
            .transpose()
            .map_err(|_| StoreError::Corrupt(format!("entity {}: sequence out of range", row.id)))?;
        Ok(CodedEntity {
            id: row.id,
            kind,
            code: row.code,
            parent_id: row.parent_id,
            sequence,
            active: row.active,
            payload: row.payload.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Traducir errores de SQLx: serialización y deadlock son transitorios
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        match db.code().as_deref() {
            Some("40001") | Some("40P01") => return StoreError::Conflict(db.message().to_string()),
            Some("23505") => return StoreError::UniqueViolation(db.message().to_string()),
            _ => {}
        }
    }
    StoreError::Backend(e.to_string())
}

#[derive(Clone)]
pub struct PgCodeStore {
    pool: PgPool,
}

impl PgCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CodedEntity>, StoreError> {
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            "SELECT {} FROM coded_entities WHERE id = $1",
            ENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(CodedEntity::try_from).transpose()
    }

    async fn list(&self, filter: &EntityFilter) -> Result<Vec<CodedEntity>, StoreError> {
        let rows = sqlx::query_as::<_, EntityRow>(&format!(
            r#"
            SELECT {}
            FROM coded_entities
            WHERE ($1::TEXT IS NULL OR kind = $1)
              AND ($2::UUID IS NULL OR parent_id = $2)
              AND ($3 OR active)
            ORDER BY kind, code
            LIMIT $4 OFFSET $5
            "#,
            ENTITY_COLUMNS
        ))
        .bind(filter.kind.map(EntityKind::as_str))
        .bind(filter.parent_id)
        .bind(filter.include_inactive)
        .bind(filter.limit)
        .bind(filter.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CodedEntity::try_from).collect()
    }

    async fn codes_of_kind(&self, kind: EntityKind) -> Result<Vec<String>, StoreError> {
        let codes: Vec<(String,)> = sqlx::query_as("SELECT code FROM coded_entities WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(codes.into_iter().map(|(code,)| code).collect())
    }

    async fn last_sequence(&self, parent_id: Uuid, child_kind: EntityKind) -> Result<u32, StoreError> {
        let (last,): (i32,) = sqlx::query_as(
            r#"
            SELECT COALESCE(
                (SELECT last_sequence FROM code_sequences WHERE parent_id = $1 AND child_kind = $2),
                (SELECT MAX(sequence)::INTEGER FROM coded_entities WHERE parent_id = $1 AND kind = $2),
                0
            )
            "#,
        )
        .bind(parent_id)
        .bind(child_kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(last.max(0) as u32)
    }

    async fn update_payload(
        &self,
        id: Uuid,
        payload: EntityPayload,
    ) -> Result<Option<CodedEntity>, StoreError> {
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            "UPDATE coded_entities SET payload = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ENTITY_COLUMNS
        ))
        .bind(id)
        .bind(Json(payload))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(CodedEntity::try_from).transpose()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<CodedEntity>, StoreError> {
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            "UPDATE coded_entities SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ENTITY_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(CodedEntity::try_from).transpose()
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn parent(&mut self, parent: ParentRef) -> Result<Option<ParentRecord>, StoreError> {
        // FOR SHARE: el padre no puede desactivarse hasta que confirmemos
        let row: Option<(Uuid, String, bool)> = sqlx::query_as(
            "SELECT id, code, active FROM coded_entities WHERE id = $1 AND kind = $2 FOR SHARE",
        )
        .bind(parent.id)
        .bind(parent.kind.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(id, code, active)| ParentRecord {
            id,
            kind: parent.kind,
            code,
            active,
        }))
    }

    async fn reserve_sequence(
        &mut self,
        parent_id: Uuid,
        child_kind: EntityKind,
    ) -> Result<u32, StoreError> {
        let (next,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO code_sequences (parent_id, child_kind, last_sequence)
            VALUES (
                $1,
                $2,
                COALESCE(
                    (SELECT MAX(sequence)::INTEGER FROM coded_entities WHERE parent_id = $1 AND kind = $2),
                    0
                ) + 1
            )
            ON CONFLICT (parent_id, child_kind)
            DO UPDATE SET last_sequence = code_sequences.last_sequence + 1, updated_at = NOW()
            RETURNING last_sequence
            "#,
        )
        .bind(parent_id)
        .bind(child_kind.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(next.max(0) as u32)
    }

    async fn code_taken(&mut self, kind: EntityKind, normalized_code: &str) -> Result<bool, StoreError> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM coded_entities WHERE kind = $1 AND UPPER(code) = $2)",
        )
        .bind(kind.as_str())
        .bind(normalized_code)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(taken)
    }

    async fn insert(&mut self, entity: NewCodedEntity) -> Result<CodedEntity, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, EntityRow>(&format!(
            r#"
            INSERT INTO coded_entities (id, kind, code, parent_id, sequence, active, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $7)
            RETURNING {}
            "#,
            ENTITY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(entity.kind.as_str())
        .bind(&entity.code)
        .bind(entity.parent_id)
        .bind(entity.sequence.map(i16::from))
        .bind(Json(&entity.payload))
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        CodedEntity::try_from(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str, sequence: Option<i16>) -> EntityRow {
        EntityRow {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            code: "030101".to_string(),
            parent_id: Some(Uuid::new_v4()),
            sequence,
            active: true,
            payload: Json(EntityPayload::named("Rota Norte")),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let entity = CodedEntity::try_from(row("rota", Some(1))).unwrap();
        assert_eq!(entity.kind, EntityKind::Rota);
        assert_eq!(entity.sequence, Some(1));
        assert_eq!(entity.payload.name, "Rota Norte");
    }

    #[test]
    fn test_row_with_unknown_kind_is_corrupt() {
        let err = CodedEntity::try_from(row("vehicle", None)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_row_with_negative_sequence_is_corrupt() {
        let err = CodedEntity::try_from(row("rota", Some(-1))).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_non_database_errors_are_backend_errors() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_transient());
    }
}
