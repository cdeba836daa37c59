//! Congressional trade ingestion: filing discovery, document download,
//! table extraction, row normalization, and canonical event mapping.

pub mod catalog;
pub mod events;
pub mod export;
pub mod extractor;
pub mod fetcher;
pub mod normalizer;
pub mod orchestrator;
pub mod parsing;
pub mod pipeline;
pub mod senate;
pub mod validator;
