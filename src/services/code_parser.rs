//! Parser de códigos
//!
//! Inverso del ensamblador. Descompone un código en sus segmentos según su
//! longitud total (4, 6, 8 o 10). Todos los segmentos miden 2 caracteres en
//! todos los niveles, también al descomponer códigos de operador.

use serde::Serialize;

use super::code_assembler;
use crate::models::{EntityKind, SEGMENT_WIDTH};
use crate::utils::errors::AllocationError;
use crate::utils::validation::{validate_code_charset, validate_external_segment, validate_sequence_segment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchySegments {
    pub localidade: String,
    pub secao: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rota: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ponto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operador: Option<String>,
    /// Secuencia del último segmento; `None` para rutas de secao
    pub sequence: Option<u8>,
    pub length: usize,
    pub kind: EntityKind,
}

impl HierarchySegments {
    /// Código completo del padre inmediato
    pub fn parent_code(&self) -> String {
        let mut code = self.localidade.clone();
        let segments = [Some(&self.secao), self.rota.as_ref(), self.ponto.as_ref()];
        for segment in segments.into_iter().flatten().take(self.kind.depth() - 2) {
            code.push_str(segment);
        }
        code
    }

    /// Reconstruir el código a partir de sus propios segmentos
    pub fn reassemble(&self) -> Result<String, AllocationError> {
        match self.sequence {
            Some(sequence) => code_assembler::assemble(&self.parent_code(), u32::from(sequence)),
            None => Ok(format!("{}{}", self.localidade, self.secao)),
        }
    }
}

pub fn decompose(code: &str) -> Result<HierarchySegments, AllocationError> {
    let length = code.len();
    let kind = match EntityKind::from_code_len(length) {
        Some(kind) if kind != EntityKind::Localidade => kind,
        _ => {
            return Err(AllocationError::malformed(
                code,
                format!("unexpected length {}, expected 4, 6, 8 or 10", length),
            ))
        }
    };

    validate_code_charset(code)
        .map_err(|_| AllocationError::malformed(code, "only ASCII letters and digits are allowed"))?;

    let segments: Vec<&str> = (0..kind.depth())
        .map(|i| &code[i * SEGMENT_WIDTH..(i + 1) * SEGMENT_WIDTH])
        .collect();

    for (position, segment) in segments.iter().take(2).enumerate() {
        validate_external_segment(segment).map_err(|_| {
            AllocationError::malformed(code, format!("segment {} '{}' is invalid", position + 1, segment))
        })?;
    }

    let mut sequence = None;
    for (position, segment) in segments.iter().enumerate().skip(2) {
        let value = validate_sequence_segment(segment).map_err(|_| {
            AllocationError::malformed(
                code,
                format!("sequence segment {} '{}' is not in 01-99", position + 1, segment),
            )
        })?;
        sequence = Some(value);
    }

    let owned = |i: usize| segments.get(i).map(|s| s.to_string());
    Ok(HierarchySegments {
        localidade: segments[0].to_string(),
        secao: segments[1].to_string(),
        rota: owned(2),
        ponto: owned(3),
        operador: owned(4),
        sequence,
        length,
        kind,
    })
}

/// Comprobar que un código tiene la forma esperada para su tipo
pub fn ensure_shape(code: &str, kind: EntityKind) -> Result<(), AllocationError> {
    if kind == EntityKind::Localidade {
        return validate_external_segment(code)
            .map_err(|_| AllocationError::malformed(code, "localidade codes are 2 letters or digits"));
    }
    let segments = decompose(code)?;
    if segments.kind != kind {
        return Err(AllocationError::malformed(
            code,
            format!("a {} code has {} characters", kind, kind.code_len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_operador() {
        let segments = decompose("0301010203").unwrap();
        assert_eq!(segments.kind, EntityKind::Operador);
        assert_eq!(segments.localidade, "03");
        assert_eq!(segments.secao, "01");
        assert_eq!(segments.rota.as_deref(), Some("01"));
        assert_eq!(segments.ponto.as_deref(), Some("02"));
        assert_eq!(segments.operador.as_deref(), Some("03"));
        assert_eq!(segments.sequence, Some(3));
        assert_eq!(segments.length, 10);
        assert_eq!(segments.parent_code(), "03010102");
    }

    #[test]
    fn test_decompose_secao_path() {
        let segments = decompose("0301").unwrap();
        assert_eq!(segments.kind, EntityKind::Secao);
        assert_eq!(segments.sequence, None);
        assert_eq!(segments.parent_code(), "03");
        assert_eq!(segments.reassemble().unwrap(), "0301");
    }

    #[test]
    fn test_decompose_rejects_unexpected_lengths() {
        for code in ["", "03", "030", "03010", "03010101010"] {
            assert!(
                matches!(decompose(code), Err(AllocationError::MalformedCode { .. })),
                "{code} should be malformed"
            );
        }
    }

    #[test]
    fn test_decompose_rejects_bad_sequence_segment() {
        assert!(decompose("030100").is_err());
        assert!(decompose("0301AB").is_err());
        assert!(decompose("03-101").is_err());
    }

    #[test]
    fn test_round_trip_for_assembled_codes() {
        let mut parents = vec!["0301".to_string(), "ab9Z".to_string()];
        for _level in 0..3 {
            let mut next = Vec::new();
            for parent in &parents {
                for sequence in [1, 2, 10, 42, 99] {
                    let code = code_assembler::assemble(parent, sequence).unwrap();
                    let segments = decompose(&code).unwrap();
                    assert_eq!(segments.reassemble().unwrap(), code);
                    assert_eq!(segments.parent_code(), *parent);
                    next.push(code);
                }
            }
            parents = next;
        }
    }

    #[test]
    fn test_ensure_shape_checks_kind() {
        assert!(ensure_shape("030101", EntityKind::Rota).is_ok());
        assert!(ensure_shape("03010101", EntityKind::Rota).is_err());
        assert!(ensure_shape("03", EntityKind::Localidade).is_ok());
        assert!(ensure_shape("0", EntityKind::Localidade).is_err());
    }
}
