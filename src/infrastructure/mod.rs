pub mod cache;
pub mod core;
pub mod datasources;
pub mod exchange;
pub mod llm;
pub mod persistence;
