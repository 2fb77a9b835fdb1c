// src/services/mod.rs
pub mod analytics;
pub mod audit;
pub mod llm_client;
pub mod storage;
pub mod training;
pub mod web_import;

pub use llm_client::LlmClient;
pub use storage::ObjectStore;
