//! Storage for per-atom response intermediates.
//!
//! Entries are stacks of dense matrices (the x, y, z components) addressed by
//! keys such as `perturbed_hamiltonian/3`.

use crate::error::HessianError;
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn perturbed_hamiltonian_key(atom: usize) -> String {
    format!("perturbed_hamiltonian/{}", atom)
}

pub fn orbital_response_key(atom: usize) -> String {
    format!("orbital_response/{}", atom)
}

pub trait ResponseStore: Send {
    fn save(&mut self, key: &str, value: &[DMatrix<f64>]) -> Result<(), HessianError>;

    fn load(&self, key: &str) -> Result<Vec<DMatrix<f64>>, HessianError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: HashMap<String, Vec<DMatrix<f64>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseStore for InMemoryStore {
    fn save(&mut self, key: &str, value: &[DMatrix<f64>]) -> Result<(), HessianError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<DMatrix<f64>>, HessianError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| HessianError::MissingEntry(key.to_string()))
    }
}

/// One JSON file per key below a root directory; `a/b` maps to `<root>/a/b.json`.
#[derive(Debug)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, HessianError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| HessianError::Storage {
            path: root.clone(),
            source,
        })?;
        Ok(CheckpointStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(key.split('/'));
        path.set_extension("json");
        path
    }
}

impl ResponseStore for CheckpointStore {
    fn save(&mut self, key: &str, value: &[DMatrix<f64>]) -> Result<(), HessianError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| HessianError::Storage {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string(value).map_err(|source| HessianError::Serialization {
            key: key.to_string(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| HessianError::Storage {
            path: path.clone(),
            source,
        })?;
        debug!("Saved {} to {}", key, path.display());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<DMatrix<f64>>, HessianError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(HessianError::MissingEntry(key.to_string()));
        }
        let text = fs::read_to_string(&path).map_err(|source| HessianError::Storage {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HessianError::Serialization {
            key: key.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Vec<DMatrix<f64>> {
        (0..3)
            .map(|x| DMatrix::from_fn(4, 2, |i, j| (x * 8 + i * 2 + j) as f64 * 0.125 - 1.0))
            .collect()
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryStore::new();
        store.save(&perturbed_hamiltonian_key(2), &stack()).unwrap();
        assert_eq!(store.load("perturbed_hamiltonian/2").unwrap(), stack());
        assert!(matches!(
            store.load(&orbital_response_key(2)),
            Err(HessianError::MissingEntry(_))
        ));
    }

    #[test]
    fn test_checkpoint_store_persists_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CheckpointStore::open(dir.path()).unwrap();
            store.save(&orbital_response_key(0), &stack()).unwrap();
        }
        assert!(dir.path().join("orbital_response").join("0.json").exists());
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert_eq!(store.load(&orbital_response_key(0)).unwrap(), stack());
        assert!(matches!(
            store.load(&orbital_response_key(1)),
            Err(HessianError::MissingEntry(_))
        ));
    }

    #[test]
    fn test_corrupt_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("perturbed_hamiltonian")).unwrap();
        fs::write(dir.path().join("perturbed_hamiltonian").join("1.json"), "not json").unwrap();
        assert!(matches!(
            store.load(&perturbed_hamiltonian_key(1)),
            Err(HessianError::Serialization { .. })
        ));
    }
}
