pub mod code_controller;
pub mod entity_controller;
