//! Services module
//!
//! Lógica de asignación y validación de códigos jerárquicos. El ensamblador
//! y el parser son puros; el asignador de secuencias y el validador de
//! duplicados operan dentro de la transacción que abre `AllocationService`.

pub mod allocation_service;
pub mod code_assembler;
pub mod code_parser;
pub mod duplicate_validator;
pub mod sequence_allocator;

pub use allocation_service::{AllocationService, AuditFinding, AuditReport, CodePreview};
pub use code_parser::HierarchySegments;
pub use duplicate_validator::{CodeIndex, DuplicateValidator, InvalidReason, ValidationOutcome};
pub use sequence_allocator::SequenceAllocator;
