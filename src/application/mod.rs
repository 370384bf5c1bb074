// Application layer - Use cases over the domain model
pub mod chart_registry;
pub mod data_fetcher;
pub mod export_history;
pub mod export_service;
pub mod rendering;
pub mod report_repository;

#[cfg(test)]
pub mod test_support;
