//! Utilidades de validación
//!
//! Funciones helper para validar segmentos de código y los campos
//! numéricos del payload.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::ValidationError;

use crate::models::SEGMENT_WIDTH;

lazy_static! {
    /// Segmento asignado externamente (localidade, secao): 2 alfanuméricos
    static ref EXTERNAL_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9]{2}$").expect("static regex");
    /// Segmento de secuencia: 01-99
    static ref SEQUENCE_SEGMENT: Regex = Regex::new(r"^(0[1-9]|[1-9][0-9])$").expect("static regex");
    /// Código completo: solo alfanuméricos ASCII
    static ref CODE_CHARSET: Regex = Regex::new(r"^[A-Za-z0-9]*$").expect("static regex");
}

/// Validar un segmento asignado desde fuera del sistema
pub fn validate_external_segment(value: &str) -> Result<(), ValidationError> {
    if !EXTERNAL_SEGMENT.is_match(value) {
        let mut error = ValidationError::new("external_segment");
        error.add_param("value".into(), &value.to_string());
        error.add_param("width".into(), &SEGMENT_WIDTH);
        return Err(error);
    }
    Ok(())
}

/// Validar un segmento de secuencia y devolver su valor numérico
pub fn validate_sequence_segment(value: &str) -> Result<u8, ValidationError> {
    if !SEQUENCE_SEGMENT.is_match(value) {
        let mut error = ValidationError::new("sequence_segment");
        error.add_param("value".into(), &value.to_string());
        error.add_param("range".into(), &"01-99".to_string());
        return Err(error);
    }
    value.parse::<u8>().map_err(|_| ValidationError::new("sequence_segment"))
}

/// Validar que un código solo contenga alfanuméricos ASCII
pub fn validate_code_charset(value: &str) -> Result<(), ValidationError> {
    if !CODE_CHARSET.is_match(value) {
        let mut error = ValidationError::new("code_charset");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un valor esté en un rango específico
pub fn validate_range<T: PartialOrd + std::fmt::Display + Serialize>(
    value: T,
    min: T,
    max: T,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        let mut error = ValidationError::new("range");
        error.add_param("min".into(), &min);
        error.add_param("max".into(), &max);
        error.add_param("actual".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar que un valor sea positivo
pub fn validate_positive<T: PartialOrd + std::fmt::Display + num_traits::Zero + Serialize>(
    value: T,
) -> Result<(), ValidationError> {
    if value <= T::zero() {
        let mut error = ValidationError::new("positive");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}
