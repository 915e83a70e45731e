pub mod action;
pub mod agent;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod parser;
pub mod perception;
pub mod prompts;
