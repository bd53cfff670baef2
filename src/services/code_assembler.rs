//! Ensamblador de códigos
//!
//! Función pura: código del padre + secuencia con relleno de ceros a 2 dígitos.
//! El padre debe ser una ruta completa de secao, rota o ponto.

use super::code_parser;
use crate::models::SEGMENT_WIDTH;
use crate::utils::errors::AllocationError;

pub const MIN_SEQUENCE: u32 = 1;
pub const MAX_SEQUENCE: u32 = 99;

/// Componer el código de un hijo.
///
/// `sequence` debe estar en `[1, 99]`; el resultado siempre tiene el código
/// del padre como prefijo literal y se puede volver a descomponer.
pub fn assemble(parent_code: &str, sequence: u32) -> Result<String, AllocationError> {
    if !(MIN_SEQUENCE..=MAX_SEQUENCE).contains(&sequence) {
        return Err(AllocationError::SequenceOutOfRange(sequence));
    }
    let parent = code_parser::decompose(parent_code)?;
    if parent.kind.child().is_none() {
        return Err(AllocationError::malformed(
            parent_code,
            format!("{} codes have no children", parent.kind),
        ));
    }
    Ok(format!("{}{:0width$}", parent_code, sequence, width = SEGMENT_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_pads_sequence() {
        assert_eq!(assemble("0301", 1).unwrap(), "030101");
        assert_eq!(assemble("030101", 12).unwrap(), "03010112");
        assert_eq!(assemble("03010101", 99).unwrap(), "0301010199");
    }

    #[test]
    fn test_assemble_keeps_parent_prefix() {
        let code = assemble("aB01", 7).unwrap();
        assert!(code.starts_with("aB01"));
    }

    #[test]
    fn test_assemble_rejects_malformed_parents() {
        for parent in ["", "03", "030", "03010", "0301010", "03-1", "030100"] {
            assert!(
                matches!(assemble(parent, 1), Err(AllocationError::MalformedCode { .. })),
                "{parent} should be rejected"
            );
        }
    }

    #[test]
    fn test_assemble_rejects_operador_parent() {
        assert!(matches!(
            assemble("0301010101", 1),
            Err(AllocationError::MalformedCode { .. })
        ));
    }

    #[test]
    fn test_assemble_rejects_out_of_range() {
        assert!(matches!(
            assemble("0301", 0),
            Err(AllocationError::SequenceOutOfRange(0))
        ));
        assert!(matches!(
            assemble("0301", 100),
            Err(AllocationError::SequenceOutOfRange(100))
        ));
    }
}
