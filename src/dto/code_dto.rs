use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::EntityKind;

// Request para ensamblar un código (vista previa pura)
#[derive(Debug, Deserialize, Validate)]
pub struct AssembleCodeRequest {
    #[validate(length(min = 1, max = 10))]
    pub parent_code: String,
    pub sequence: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssembleCodeResponse {
    pub parent_code: String,
    pub sequence: u32,
    pub code: String,
}

// Request para validar un código contra todos los de su tipo
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCodeRequest {
    #[validate(length(min = 1, max = 10))]
    pub code: String,
    pub kind: EntityKind,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub kind: EntityKind,
}
