// Infrastructure layer - External dependencies and adapters
pub mod assets;
pub mod chart_renderer;
pub mod config;
pub mod grc_api_repository;
pub mod http_response;
pub mod pdf;
pub mod xlsx;
