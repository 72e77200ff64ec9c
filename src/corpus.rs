//! Corpus and golden dataset files

use crate::types::Document;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Wrapped { movies: Vec<Document> },
    Bare(Vec<Document>),
}

/// Reads `{"movies": [...]}` or a bare JSON array of documents
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Validation(format!("cannot read corpus {}: {e}", path.display())))?;
    let documents = parse_documents(&content)?;

    tracing::info!("[CORPUS] Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

pub fn parse_documents(content: &str) -> Result<Vec<Document>> {
    let file: CorpusFile = serde_json::from_str(content)?;
    Ok(match file {
        CorpusFile::Wrapped { movies } => movies,
        CorpusFile::Bare(documents) => documents,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub query: String,
    pub relevant_docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenDataset {
    pub test_cases: Vec<TestCase>,
}

impl GoldenDataset {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Validation(format!("cannot read golden dataset {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
