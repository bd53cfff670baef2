use validator::Validate;

use crate::dto::code_dto::{AssembleCodeRequest, AssembleCodeResponse, ValidateCodeRequest};
use crate::models::EntityKind;
use crate::services::{AllocationService, AuditReport, HierarchySegments, ValidationOutcome};
use crate::utils::errors::AppResult;

pub struct CodeController {
    service: AllocationService,
}

impl CodeController {
    pub fn new(service: AllocationService) -> Self {
        Self { service }
    }

    pub fn assemble(&self, request: AssembleCodeRequest) -> AppResult<AssembleCodeResponse> {
        request.validate()?;

        let code = AllocationService::allocate(&request.parent_code, request.sequence)?;
        Ok(AssembleCodeResponse {
            parent_code: request.parent_code,
            sequence: request.sequence,
            code,
        })
    }

    pub async fn validate(&self, request: ValidateCodeRequest) -> AppResult<ValidationOutcome> {
        request.validate()?;
        Ok(self.service.validate(request.code.trim(), request.kind).await?)
    }

    pub fn decompose(&self, code: &str) -> AppResult<HierarchySegments> {
        Ok(AllocationService::decompose(code)?)
    }

    pub async fn audit(&self, kind: EntityKind) -> AppResult<AuditReport> {
        Ok(self.service.audit(kind).await?)
    }
}
