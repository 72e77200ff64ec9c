pub mod answer;
pub mod cache;
pub mod chunking;
pub mod corpus;
pub mod embeddings;
pub mod enhance;
pub mod evaluation;
pub mod generation;
pub mod handlers;
pub mod http;
pub mod rerank;
pub mod retry;
pub mod search;
pub mod session;
pub mod tokenizer;

pub mod error;
pub mod types;
pub mod config;

pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
