//! Asignación y validación de códigos jerárquicos de cobranza
//!
//! Localidade → Secao → Rota → Ponto → Operador. Cada código almacenado es
//! la ruta completa desde la localidade, en segmentos de dos caracteres.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
