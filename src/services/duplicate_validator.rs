//! Validador de códigos duplicados
//!
//! La unicidad es global por tipo de entidad y no distingue mayúsculas.
//! Los códigos se normalizan una sola vez (mayúsculas) y se guardan en un
//! conjunto de claves, en lugar de comparar caso a caso.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::EntityKind;
use crate::repositories::code_store::StoreTransaction;
use crate::utils::errors::AllocationError;

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Conjunto normalizado de códigos emitidos (ámbito de colisión)
#[derive(Debug, Clone, Default)]
pub struct CodeIndex {
    keys: HashSet<String>,
}

impl CodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: codes.into_iter().map(|c| normalize_code(c.as_ref())).collect(),
        }
    }

    /// Devuelve `false` si el código ya estaba
    pub fn insert(&mut self, code: &str) -> bool {
        self.keys.insert(normalize_code(code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.keys.contains(&normalize_code(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    DuplicateCode,
    MalformedCode,
}

/// `{ "valid": true }` o `{ "valid": false, "reason": "DuplicateCode" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

pub struct DuplicateValidator;

impl DuplicateValidator {
    /// Validar un candidato contra un ámbito de colisión ya cargado
    pub fn validate(code: &str, scope: &CodeIndex) -> ValidationOutcome {
        if scope.contains(code) {
            ValidationOutcome::invalid(InvalidReason::DuplicateCode)
        } else {
            ValidationOutcome::valid()
        }
    }

    /// Guardia final dentro de la transacción de asignación.
    /// Consultar fuera de la transacción reabriría la carrera.
    pub async fn ensure_unique(
        tx: &mut dyn StoreTransaction,
        kind: EntityKind,
        code: &str,
    ) -> Result<(), AllocationError> {
        if tx.code_taken(kind, &normalize_code(code)).await? {
            return Err(AllocationError::DuplicateCode {
                kind,
                code: code.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_is_case_insensitive() {
        let scope = CodeIndex::from_codes(["ab01"]);
        let outcome = DuplicateValidator::validate("AB01", &scope);
        assert_eq!(outcome, ValidationOutcome::invalid(InvalidReason::DuplicateCode));
    }

    #[test]
    fn test_validate_free_code() {
        let scope = CodeIndex::from_codes(["030101", "030102"]);
        assert!(DuplicateValidator::validate("030103", &scope).is_valid());
        assert!(DuplicateValidator::validate("030101", &CodeIndex::new()).is_valid());
    }

    #[test]
    fn test_index_insert_reports_existing() {
        let mut index = CodeIndex::new();
        assert!(index.insert("ab"));
        assert!(!index.insert("AB"));
        assert!(index.contains("Ab"));
    }

    #[test]
    fn test_outcome_serialization() {
        let valid = serde_json::to_value(ValidationOutcome::valid()).unwrap();
        assert_eq!(valid, serde_json::json!({ "valid": true }));

        let invalid =
            serde_json::to_value(ValidationOutcome::invalid(InvalidReason::DuplicateCode)).unwrap();
        assert_eq!(
            invalid,
            serde_json::json!({ "valid": false, "reason": "DuplicateCode" })
        );
    }
}
