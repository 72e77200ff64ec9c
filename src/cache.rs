//! On-disk cache artifacts shared by the keyword and semantic indices
//!
//! Artifacts are staged under `<name>.tmp` and only renamed into place once
//! every artifact of a set has been written, so a reader never observes a
//! half-written index.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Encode(format!("Failed to serialize cache artifact: {e}")))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| Error::Encode(format!("Failed to deserialize cache artifact: {e}")))?;
    Ok(value)
}

/// Writes every `(file name, bytes)` pair into `dir`, then renames them into place
pub fn write_all(dir: &Path, artifacts: &[(&str, Vec<u8>)]) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    for (name, bytes) in artifacts {
        std::fs::write(dir.join(format!("{name}.tmp")), bytes)?;
    }
    for (name, _) in artifacts {
        std::fs::rename(dir.join(format!("{name}.tmp")), dir.join(name))?;
    }

    Ok(())
}

/// Reads and decodes one bincode artifact; absence or corruption is a `MissingCache`
pub fn read_bincode<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let bytes = std::fs::read(&path)
        .map_err(|e| Error::MissingCache(format!("{}: {e}", path.display())))?;
    decode(&bytes).map_err(|e| Error::MissingCache(format!("{}: {e}", path.display())))
}

pub fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::MissingCache(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::MissingCache(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let mut map = BTreeMap::new();
        map.insert("bear".to_string(), vec![1u64, 4]);

        write_all(dir.path(), &[("index.bin", encode(&map).unwrap())]).unwrap();

        assert!(!dir.path().join("index.bin.tmp").exists());
        let loaded: BTreeMap<String, Vec<u64>> = read_bincode(dir.path(), "index.bin").unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_missing_and_corrupt_artifacts() {
        let dir = tempdir().unwrap();
        let missing: Result<Vec<u64>> = read_bincode(dir.path(), "absent.bin");
        assert!(matches!(missing, Err(Error::MissingCache(_))));

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let broken: Result<serde_json::Value> = read_json(dir.path(), "broken.json");
        assert!(matches!(broken, Err(Error::MissingCache(_))));
    }
}
