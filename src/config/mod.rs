//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y la política de reintentos de la asignación.

pub mod database;
pub mod environment;

pub use database::DatabaseConfig;
pub use environment::*;
