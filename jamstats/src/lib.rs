pub mod aggregator;
pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod resolver;
pub mod sources;
pub mod synth;
