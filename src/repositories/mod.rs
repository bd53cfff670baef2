//! Repositorios
//!
//! Contrato del almacén de códigos y sus implementaciones (PostgreSQL y memoria).

pub mod code_store;
pub mod memory_code_store;
pub mod pg_code_store;

pub use code_store::{CodeStore, StoreError, StoreTransaction};
pub use memory_code_store::MemoryCodeStore;
pub use pg_code_store::PgCodeStore;
