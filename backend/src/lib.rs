pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod routes;
