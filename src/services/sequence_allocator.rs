//! Asignador de secuencias
//!
//! Un contador atómico por ámbito padre, incrementado dentro de la
//! transacción de asignación. Nunca se calcula "hijos existentes + 1".

use tracing::debug;

use super::code_assembler::MAX_SEQUENCE;
use crate::models::{EntityKind, ParentRecord};
use crate::repositories::code_store::StoreTransaction;
use crate::utils::errors::AllocationError;

pub struct SequenceAllocator;

impl SequenceAllocator {
    /// Reservar la siguiente secuencia bajo `parent`.
    ///
    /// La reserva vive en la transacción: si esta no se confirma, el número no
    /// se consume. Superar 99 es `SequenceExhausted`, sin volver a 00.
    pub async fn reserve(
        tx: &mut dyn StoreTransaction,
        parent: &ParentRecord,
        child_kind: EntityKind,
    ) -> Result<u32, AllocationError> {
        let next = tx.reserve_sequence(parent.id, child_kind).await?;
        if next > MAX_SEQUENCE {
            return Err(AllocationError::SequenceExhausted {
                parent_code: parent.code.clone(),
                max: MAX_SEQUENCE,
            });
        }
        debug!(parent = %parent.code, %child_kind, sequence = next, "🔢 Secuencia reservada");
        Ok(next)
    }
}
