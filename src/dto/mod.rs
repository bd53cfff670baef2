pub mod api_response;
pub mod code_dto;
pub mod entity_dto;

pub use api_response::ApiResponse;
