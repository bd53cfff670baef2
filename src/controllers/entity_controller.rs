use uuid::Uuid;
use validator::Validate;

use crate::dto::entity_dto::{CreateEntityRequest, EntityResponse, ListEntitiesQuery, UpdateEntityRequest};
use crate::dto::ApiResponse;
use crate::models::{CodedEntity, EntityKind, ParentRef};
use crate::services::{AllocationService, CodePreview};
use crate::utils::errors::{bad_request_error, not_found_error, AllocationError, AppResult};

pub struct EntityController {
    service: AllocationService,
    kind: EntityKind,
}

impl EntityController {
    pub fn new(service: AllocationService, kind: EntityKind) -> Self {
        Self { service, kind }
    }

    pub async fn create(
        &self,
        request: CreateEntityRequest,
    ) -> AppResult<ApiResponse<EntityResponse>> {
        request.validate()?;

        let entity = match self.kind {
            EntityKind::Localidade => {
                let code = request
                    .code
                    .as_deref()
                    .ok_or_else(|| bad_request_error("El código de la localidade es requerido"))?;
                self.service.register_localidade(code, request.payload).await?
            }
            EntityKind::Secao => {
                let localidade_id = request
                    .parent_id
                    .ok_or_else(|| bad_request_error("parent_id (localidade) es requerido"))?;
                let segment = request
                    .code
                    .as_deref()
                    .ok_or_else(|| bad_request_error("El código de la secao es requerido"))?;
                self.service
                    .register_secao(localidade_id, segment, request.payload)
                    .await?
            }
            kind => {
                if request.code.is_some() {
                    return Err(bad_request_error(
                        "El código de rotas, pontos y operadores lo asigna el sistema",
                    ));
                }
                let parent_id = request
                    .parent_id
                    .ok_or_else(|| bad_request_error("parent_id es requerido"))?;
                let parent_kind = kind
                    .parent()
                    .ok_or_else(|| bad_request_error("Tipo sin padre"))?;
                self.service
                    .create_coded_entity(ParentRef::new(parent_kind, parent_id), request.payload)
                    .await?
            }
        };

        let message = format!("{} {} creada exitosamente", self.kind, entity.code);
        Ok(ApiResponse::success_with_message(entity.into(), message))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<EntityResponse> {
        Ok(self.load(id).await?.into())
    }

    pub async fn list(&self, query: ListEntitiesQuery) -> AppResult<Vec<EntityResponse>> {
        let entities = self.service.list(&query.into_filter(self.kind)).await?;
        Ok(entities.into_iter().map(EntityResponse::from).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateEntityRequest,
    ) -> AppResult<ApiResponse<EntityResponse>> {
        request.validate()?;
        self.load(id).await?;

        let entity = self.service.update_payload(id, request.payload).await?;
        Ok(ApiResponse::success_with_message(
            entity.into(),
            "Entidad actualizada exitosamente".to_string(),
        ))
    }

    pub async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> AppResult<ApiResponse<EntityResponse>> {
        self.load(id).await?;

        let entity = self.service.set_active(id, active).await?;
        let message = if active {
            "Entidad reactivada exitosamente"
        } else {
            "Entidad desactivada exitosamente"
        };
        Ok(ApiResponse::success_with_message(entity.into(), message.to_string()))
    }

    pub async fn preview_next_code(&self, id: Uuid) -> AppResult<CodePreview> {
        Ok(self
            .service
            .preview_next_code(ParentRef::new(self.kind, id))
            .await?)
    }

    /// Cargar la entidad comprobando que es del tipo del router
    async fn load(&self, id: Uuid) -> AppResult<CodedEntity> {
        match self.service.get(id).await {
            Ok(entity) if entity.kind == self.kind => Ok(entity),
            Ok(_) | Err(AllocationError::NotFound(_)) => {
                Err(not_found_error(self.kind.as_str(), &id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
