//! protgraph - association graph assembly
//!
//! Turns protein association and functional-term overlap query results
//! into laid-out, highlighted graph documents for visualization.

pub mod adapter;
pub mod config;
pub mod experiment;
pub mod graph;
pub mod hubs;
pub mod layout;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod service;

pub use merge::GraphDocument;
pub use pipeline::{GraphPipeline, PipelineError};
