//! Datos de negocio inertes que viajan junto al código
//!
//! Nombre, dirección, comisión, factor de conversión y serie del equipo.
//! Ninguno participa en la asignación de códigos.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct EntityPayload {
    #[validate(length(min = 1, max = 120), custom = "validate_name")]
    pub name: String,

    #[validate(length(max = 500))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Dirección del ponto
    #[validate(length(max = 250))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Porcentaje de comisión del ponto (0-100)
    #[validate(custom = "validate_percentage")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_percent: Option<Decimal>,

    /// Factor de conversión del operador
    #[validate(custom = "validate_conversion_factor")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_factor: Option<Decimal>,

    /// Número de serie del equipo vinculado al operador
    #[validate(length(min = 1, max = 64))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,
}

impl EntityPayload {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    crate::utils::validation::validate_not_empty(value)
}

fn validate_percentage(value: &Decimal) -> Result<(), ValidationError> {
    crate::utils::validation::validate_range(*value, Decimal::ZERO, Decimal::ONE_HUNDRED)
}

fn validate_conversion_factor(value: &Decimal) -> Result<(), ValidationError> {
    crate::utils::validation::validate_positive(*value)
}
