//! Modelos del sistema
//!
//! Este módulo contiene los modelos de la jerarquía de códigos:
//! tipos de entidad, entidades codificadas y su payload.

pub mod coded_entity;
pub mod entity_kind;
pub mod payload;

pub use coded_entity::{CodedEntity, EntityFilter, NewCodedEntity, ParentRecord, ParentRef};
pub use entity_kind::{EntityKind, SEGMENT_WIDTH};
pub use payload::EntityPayload;
