// Domain layer - Core models and validation, no I/O
pub mod chart;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod locale;
pub mod request;
pub mod table;
