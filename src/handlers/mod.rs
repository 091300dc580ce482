pub mod auth_handlers;
pub mod context;
pub mod deposit_handlers;
pub mod file_handlers;
pub mod health_handlers;
