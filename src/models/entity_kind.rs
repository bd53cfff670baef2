//! Tipos de entidad de la jerarquía
//!
//! Localidade → Secao → Rota → Ponto → Operador. Cada nivel añade un
//! segmento fijo de 2 caracteres al código de su padre.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ancho fijo de cada segmento del código, en todos los niveles
pub const SEGMENT_WIDTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Localidade,
    Secao,
    Rota,
    Ponto,
    Operador,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Localidade,
        EntityKind::Secao,
        EntityKind::Rota,
        EntityKind::Ponto,
        EntityKind::Operador,
    ];

    /// Profundidad en la jerarquía (Localidade = 1)
    pub fn depth(self) -> usize {
        match self {
            EntityKind::Localidade => 1,
            EntityKind::Secao => 2,
            EntityKind::Rota => 3,
            EntityKind::Ponto => 4,
            EntityKind::Operador => 5,
        }
    }

    /// Longitud total del código completo de este nivel
    pub fn code_len(self) -> usize {
        self.depth() * SEGMENT_WIDTH
    }

    pub fn parent(self) -> Option<EntityKind> {
        match self {
            EntityKind::Localidade => None,
            EntityKind::Secao => Some(EntityKind::Localidade),
            EntityKind::Rota => Some(EntityKind::Secao),
            EntityKind::Ponto => Some(EntityKind::Rota),
            EntityKind::Operador => Some(EntityKind::Ponto),
        }
    }

    pub fn child(self) -> Option<EntityKind> {
        match self {
            EntityKind::Localidade => Some(EntityKind::Secao),
            EntityKind::Secao => Some(EntityKind::Rota),
            EntityKind::Rota => Some(EntityKind::Ponto),
            EntityKind::Ponto => Some(EntityKind::Operador),
            EntityKind::Operador => None,
        }
    }

    /// Los niveles cuyo último segmento es una secuencia asignada por el sistema.
    /// Localidade y Secao reciben su segmento desde fuera.
    pub fn is_sequenced(self) -> bool {
        matches!(self, EntityKind::Rota | EntityKind::Ponto | EntityKind::Operador)
    }

    pub fn from_code_len(len: usize) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|kind| kind.code_len() == len)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Localidade => "localidade",
            EntityKind::Secao => "secao",
            EntityKind::Rota => "rota",
            EntityKind::Ponto => "ponto",
            EntityKind::Operador => "operador",
        }
    }

    /// Segmento de ruta usado por el router HTTP
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Localidade => "localidades",
            EntityKind::Secao => "secoes",
            EntityKind::Rota => "rotas",
            EntityKind::Ponto => "pontos",
            EntityKind::Operador => "operadores",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind '{0}'")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered || kind.plural() == lowered)
            .ok_or(UnknownEntityKind(s.to_string()))
    }
}
